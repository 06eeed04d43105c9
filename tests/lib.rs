use std::fs;
use std::process::Command;

const HMP2: &str = env!("CARGO_BIN_EXE_hmp2");

fn run(args: &str) -> bool {
    Command::new("bash")
        .arg("-c")
        .arg(format!("{} {}", HMP2, args))
        .spawn()
        .unwrap()
        .wait()
        .unwrap()
        .success()
}

fn test_output(result: &str, expected: &str) {
    assert!(Command::new("cmp")
        .arg(result)
        .arg(expected)
        .spawn()
        .unwrap()
        .wait()
        .unwrap()
        .success());
    fs::remove_file(result).unwrap();
}

#[test]
fn bam_to_fastq() {
    assert!(run("bam-to-fastq -o tests tests/reads.sam"));
    test_output("tests/reads.fastq", "tests/expected/reads.fastq");
}

#[test]
fn relative_abundance() {
    assert!(run("relative-abundance -o tests tests/counts.tsv"));
    test_output("tests/counts.rel_abund.tsv", "tests/expected/counts.rel_abund.tsv");
}

#[test]
fn fix_otu_taxonomy() {
    assert!(run("fix-otu-taxonomy -o tests tests/otu_table.tsv"));
    test_output(
        "tests/otu_table_taxonomy_fix.tsv",
        "tests/expected/otu_table_taxonomy_fix.tsv",
    );
}

#[test]
fn excel_to_csv() {
    assert!(run("excel-to-csv -o tests tests/data_dictionary.xlsx"));
    test_output("tests/data_dictionary.csv", "tests/expected/data_dictionary.csv");
}

#[test]
fn knead_log_counts() {
    assert!(run(
        "knead-log-counts -d MGX -o tests/kneaddata_read_counts.tsv tests/knead_logs"
    ));
    test_output(
        "tests/kneaddata_read_counts.tsv",
        "tests/expected/kneaddata_read_counts.tsv",
    );
}

#[test]
fn manifest_from_file_list() {
    let dir = tempfile::tempdir().unwrap();
    let list = dir.path().join("files.txt");
    fs::write(
        &list,
        "/seq/MSM5LLGE.fastq.gz\nHTX;/seq/HSM5MD3A.bam\n/seq/MSM5LLGG.fastq.gz\n",
    )
    .unwrap();
    let manifest = dir.path().join("MANIFEST.yaml");
    assert!(run(&format!(
        "manifest-from-file-list -i {} -d MGX --origin-institute Broad \
         --origin-contact 'Jane Doe' --origin-contact-email jdoe@example.org -o {}",
        list.display(),
        manifest.display()
    )));

    let yaml: serde_yaml::Value = serde_yaml::from_str(&fs::read_to_string(&manifest).unwrap()).unwrap();
    assert_eq!(yaml["origin_institute"].as_str(), Some("Broad"));
    assert_eq!(yaml["project"].as_str(), Some("HMP2"));
    assert_eq!(
        yaml["submitted_files"]["MGX"]["input"].as_sequence().map(|s| s.len()),
        Some(2)
    );
    assert_eq!(
        yaml["submitted_files"]["HTX"]["input"][0].as_str(),
        Some("/seq/HSM5MD3A.bam")
    );
}

#[test]
fn checksums() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("profile.tsv");
    fs::write(&file, "hello\n").unwrap();

    assert!(run(&format!("generate-checksums {}", file.display())));
    let md5 = dir.path().join("profile.md5");
    assert_eq!(
        fs::read_to_string(&md5).unwrap(),
        "b1946ac92492d2347c6235b4d2611184  profile.tsv\n"
    );
    assert!(run(&format!("verify-checksums -c {} {}", md5.display(), file.display())));

    fs::write(&file, "changed\n").unwrap();
    assert!(!run(&format!("verify-checksums -c {} {}", md5.display(), file.display())));
}

#[test]
fn harmonize_tsv() {
    let dir = tempfile::tempdir().unwrap();
    let tsv = dir.path().join("ecs.tsv");
    let samples = dir.path().join("remove.txt");
    let output = dir.path().join("ecs.harmonized.tsv");
    fs::write(&tsv, "# Gene Family\tS1\tS2\tS3\nEC1\t1\t2\t3\n").unwrap();
    fs::write(&samples, "S2\tmetagenomics\n").unwrap();

    assert!(run(&format!(
        "harmonize-tsv {} {} {}",
        tsv.display(),
        samples.display(),
        output.display()
    )));
    assert_eq!(
        fs::read_to_string(&output).unwrap(),
        "# Gene Family\tS1\tS3\nEC1\t1\t3\n"
    );
}

#[test]
fn stage_and_tar_files() {
    let src = tempfile::tempdir().unwrap();
    let dst = tempfile::tempdir().unwrap();
    let file = src.path().join("S1_taxonomic_profile.tsv");
    fs::write(&file, "a\n").unwrap();

    assert!(run(&format!(
        "stage-files -t {} {}",
        dst.path().display(),
        file.display()
    )));
    let staged = dst.path().join("S1_taxonomic_profile.tsv");
    assert_eq!(fs::read_to_string(&staged).unwrap(), "a\n");

    assert!(run(&format!("make-web-visible {}", staged.display())));
    assert!(dst.path().join("complete.html").exists());

    let tarball = dst.path().join("profiles.tar.gz");
    assert!(run(&format!(
        "tar-files --compress -o {} {}",
        tarball.display(),
        staged.display()
    )));
    assert!(fs::metadata(&tarball).unwrap().len() > 0);

    assert!(!run(&format!(
        "stage-files -t {} {}",
        dst.path().join("missing").display(),
        file.display()
    )));
}
