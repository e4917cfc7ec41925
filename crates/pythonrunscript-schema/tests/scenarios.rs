//! End-to-end parsing scenarios over whole script files.

use pythonrunscript_schema::{parse_script_file, parse_script_str, BlockError, Grammar};
use std::fs;

#[test]
fn requests_fence_scenario() {
    let parsed = parse_script_str("# ```requirements.txt\n# requests==2.26.0\n# ```\n");
    assert_eq!(parsed.dependencies.pip_requirements, "requests==2.26.0");
    assert_eq!(parsed.dependencies.conda_env_yaml, "");
    assert_eq!(parsed.dependencies.conda_specs, "");
}

#[test]
fn pip_and_conda_fences_are_both_kept() {
    let source = "\
#!/usr/bin/env pythonrunscript
# ```requirements.txt
# rich
# ```
# ```conda_install_specs.txt
# python=3.10
# ffmpeg
# ```

import rich
";
    let parsed = parse_script_str(source);
    assert!(parsed.dependencies.needs_conda());
    assert_eq!(parsed.dependencies.pip_requirements, "rich");
    assert_eq!(parsed.dependencies.conda_specs, "python=3.10\nffmpeg");
}

#[test]
fn identical_blocks_share_fingerprint_across_bodies() {
    let dir = tempfile::tempdir().unwrap();
    let header = "# ```requirements.txt\n# tqdm==4.66.4\n# ```\n";
    let a = dir.path().join("a.py");
    let b = dir.path().join("b.py");
    fs::write(&a, format!("{header}\nprint('a')\n")).unwrap();
    fs::write(&b, format!("{header}\nimport sys\nsys.exit(3)\n")).unwrap();

    let id_a = parse_script_file(&a).unwrap().dependencies.identity();
    let id_b = parse_script_file(&b).unwrap().dependencies.identity();
    assert_eq!(id_a, id_b);
}

#[test]
fn reparsing_is_stable() {
    let source = "# ```requirements.txt\n# numpy\n# ```\n";
    let first = parse_script_str(source).dependencies.identity();
    let second = parse_script_str(source).dependencies.identity();
    assert_eq!(first, second);

    let changed = parse_script_str("# ```requirements.txt\n# numpy \n# scipy\n# ```\n")
        .dependencies
        .identity();
    assert_ne!(first, changed);
}

#[test]
fn unclosed_conda_block_followed_by_pip_fence_is_rejected() {
    let source = "\
# ```conda_install_specs.txt
# ffmpeg
# ```requirements.txt
# rich
# ```
";
    let parsed = parse_script_str(source);
    assert!(parsed.dependencies.is_empty());
    assert_eq!(parsed.diagnostics.len(), 1);
    assert_eq!(parsed.diagnostics[0].grammar, Grammar::Fenced);
    assert!(matches!(
        parsed.diagnostics[0].error,
        BlockError::Nested { line: 3, .. }
    ));
}

#[test]
fn adversarial_header_never_panics() {
    let sources = [
        "# ```",
        "# ///",
        "# /// script\n# dependencies = [\"",
        "# /// script\n# dependencies = [\n# ]]]\n# ///",
        "# /// script\n# requires-python = \"\"\"x\"\"\"\n# ///",
        "# /// script\n# = \n# ///",
        "#\u{feff}```requirements.txt\n# a\n# ```",
        "# ```requirements.txt\n# é\u{0}\n# ```",
    ];
    for source in sources {
        let _ = parse_script_str(source);
    }
}
