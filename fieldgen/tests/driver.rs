//! End-to-end generation runs.

use fieldgen::{
    FIELDS,
    driver::{self, Config, OUTPUT_DIR},
};
use std::{fs, path::PathBuf};

fn scratch(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("fieldgen-it-{name}-{}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn writes_one_module_per_field() {
    let root = scratch("all");
    let header = root.join("header.txt");
    fs::write(&header, "// SPDX-License-Identifier: Apache-2.0 OR MIT\n").unwrap();

    let written = driver::run(&Config::new(&header, root.join("out"))).unwrap();
    assert_eq!(written.len(), FIELDS.len());

    for (path, desc) in written.iter().zip(FIELDS) {
        assert_eq!(
            *path,
            root.join("out").join(OUTPUT_DIR).join(format!("{}.rs", desc.module))
        );
        let text = fs::read_to_string(path).unwrap();
        assert!(text.starts_with("// SPDX-License-Identifier: Apache-2.0 OR MIT\n//! "));
        assert!(text.contains(&format!("pub struct {};", desc.name)));
        assert!(text.contains(&format!("impl IntegerPolynomial for {} {{", desc.name)));
    }

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn rerun_overwrites() {
    let root = scratch("rerun");
    let header = root.join("header.txt");
    fs::write(&header, "// first\n").unwrap();
    let config = Config::new(&header, &root);
    let first = driver::run(&config).unwrap();

    fs::write(&header, "// second\n").unwrap();
    let second = driver::run(&config).unwrap();
    assert_eq!(first, second);

    let text = fs::read_to_string(&second[0]).unwrap();
    assert!(text.starts_with("// second\n"));

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn unsplit_output_has_no_helpers() {
    let root = scratch("unsplit");
    let header = root.join("header.txt");
    fs::write(&header, "").unwrap();
    let config = Config {
        split_threshold: None,
        ..Config::new(&header, &root)
    };
    for path in driver::run(&config).unwrap() {
        let text = fs::read_to_string(&path).unwrap();
        assert!(!text.contains("fn carry_reduce0("), "{}", path.display());
    }

    let _ = fs::remove_dir_all(&root);
}
