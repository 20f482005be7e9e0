use std::path::Path;

fn main() {
    println!("cargo:rerun-if-changed=tests/fixtures");

    let out_dir = std::env::var("OUT_DIR").unwrap();
    let destination = Path::new(&out_dir).join("fixtures.rs");
    let mut f = std::fs::File::create(&destination).unwrap();
    use std::io::Write;

    let fixtures_dir = Path::new("tests/fixtures");
    let mut entries: Vec<_> = std::fs::read_dir(fixtures_dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| p.extension().map(|s| s == "json").unwrap_or(false))
        .collect();
    entries.sort();

    for path in entries {
        let file_name = path.file_stem().unwrap().to_str().unwrap();
        let expected_slots: usize = file_name
            .split('_')
            .next_back()
            .unwrap()
            .parse()
            .expect("fixture file name must end with _<patched slot count>.json");

        writeln!(
            f,
            "fixture_test!({}, {:?}, {});",
            file_name,
            path.to_str().unwrap(),
            expected_slots
        )
        .unwrap();
        println!("cargo:rerun-if-changed={}", path.display());
    }
}
