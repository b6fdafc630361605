use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

const IBAN: &str = "FR7630006000011234567890189";

struct TestEnv {
    tmp: TempDir,
    home: PathBuf,
}

impl TestEnv {
    fn new() -> Self {
        let tmp = TempDir::new().expect("create temp dir");
        let home = tmp.path().join("home");
        fs::create_dir_all(&home).expect("create isolated home");
        Self { tmp, home }
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("releve").unwrap();
        cmd.env("HOME", &self.home).env("NO_COLOR", "1").env_remove("RELEVE_LOG");
        cmd
    }

    fn ok(&self, args: &[&str]) -> String {
        let out = self.cmd().args(args).assert().success().get_output().stdout.clone();
        String::from_utf8(out).expect("utf-8 output")
    }

    fn file(&self, name: &str, content: &str) -> String {
        let path = self.tmp.path().join(name);
        fs::write(&path, content).expect("write fixture");
        path.to_string_lossy().to_string()
    }

    /// Initialized data dir with one client, one site, one bank account
    /// and one statement format.
    fn seeded() -> Self {
        let env = Self::new();
        let data = env.tmp.path().join("data");
        env.ok(&["init", "--data-dir", data.to_str().unwrap(), "--default-client", "Bistro Group"]);
        env.ok(&["clients", "add", "Bistro Group"]);
        env.ok(&["entities", "add", "Bistro Lyon", "--code", "LYO"]);
        env.ok(&["accounts", "add", "Lyon", "--iban", IBAN, "--bank", "LCL", "--entity", "LYO"]);
        env.ok(&[
            "formats",
            "add",
            "lcl",
            "--columns",
            "date; libelle; debit; credit; compte",
            "--delimiter",
            ";",
        ]);
        env
    }
}

#[test]
fn status_without_database() {
    let env = TestEnv::new();
    env.cmd()
        .arg("status")
        .assert()
        .success()
        .stdout(contains("Database not found"));
}

#[test]
fn import_then_reimport_same_file() {
    let env = TestEnv::seeded();
    let statement = env.file(
        "janvier.csv",
        "Date;Libelle;Debit;Credit;Compte\n\
         15/01/2024;CB METRO;12,50;;FR76 3000 6000 0112 3456 7890 189\n\
         16/01/2024;VIR CLIENT;;1 200,00;12345678901\n",
    );

    env.cmd()
        .args(["import", &statement, "--format", "lcl"])
        .assert()
        .success()
        .stdout(contains("2 imported").and(contains("DONE")));

    env.cmd()
        .args(["import", &statement, "--format", "lcl"])
        .assert()
        .success()
        .stdout(contains("already been imported"));

    let entries = env.ok(&["entries", "list", "--month", "2024-01"]);
    assert!(entries.contains("CB METRO"));
    assert!(entries.contains("1 200,00"));

    let imports = env.ok(&["imports", "list"]);
    assert!(imports.contains("janvier.csv"));
}

#[test]
fn flagged_lines_can_be_reprocessed() {
    let env = TestEnv::seeded();
    let statement = env.file(
        "fevrier.csv",
        "Date;Libelle;Debit;Credit;Compte\n\
         01/02/2024;LOYER;2 000,00;;FR1420041010050500013M02606\n\
         02/02/2024;CB;5,00;;12345678901\n",
    );
    env.cmd()
        .args(["import", &statement, "--format", "lcl"])
        .assert()
        .success()
        .stdout(contains("1 errors").and(contains("PARTIAL")));

    env.cmd()
        .args(["imports", "show", "1", "--errors"])
        .assert()
        .success()
        .stdout(contains("no bank account matches"));

    env.ok(&["accounts", "add", "Siege", "--iban", "FR1420041010050500013M02606"]);
    env.cmd()
        .args(["imports", "reprocess", "1"])
        .assert()
        .success()
        .stdout(contains("2 imported").and(contains("0 errors")));
}

#[test]
fn unknown_format_is_an_error() {
    let env = TestEnv::seeded();
    let statement = env.file("x.csv", "a;b\n");
    env.cmd()
        .args(["import", &statement, "--format", "nope"])
        .assert()
        .failure()
        .stderr(contains("Unknown format: nope"));
}

#[test]
fn missing_client_is_reported() {
    let env = TestEnv::new();
    let data = env.tmp.path().join("data");
    env.ok(&["init", "--data-dir", data.to_str().unwrap()]);
    env.cmd()
        .args(["accounts", "list"])
        .assert()
        .failure()
        .stderr(contains("no client given"));
}

#[test]
fn closure_with_gap() {
    let env = TestEnv::seeded();
    env.cmd()
        .args([
            "closure",
            "record",
            "LYO",
            "--date",
            "04/03/2024",
            "--mode",
            "especes:812,40:810",
            "--mode",
            "cb:1530:1530",
        ])
        .assert()
        .success()
        .stdout(contains("DISCREPANCY").and(contains("-2,40")));

    env.cmd()
        .args(["closure", "record", "LYO", "--date", "2024-03-04", "--mode", "cb:1:1"])
        .assert()
        .failure()
        .stderr(contains("already exists"));

    env.cmd()
        .args(["closure", "list", "LYO", "--month", "2024-03"])
        .assert()
        .success()
        .stdout(contains("2024-03-04"));
}

#[test]
fn budget_grid_and_copy() {
    let env = TestEnv::seeded();
    env.ok(&["budget", "set", "LYO", "--year", "2024", "--month", "1", "--category", "bar", "1000"]);
    env.cmd()
        .args(["budget", "set", "LYO", "--year", "2024", "--month", "1", "--category", "Bar", "1200"])
        .assert()
        .failure()
        .stderr(contains("--replace"));
    env.ok(&["budget", "set", "LYO", "--year", "2024", "--month", "1", "--category", "bar", "1200", "--replace"]);

    env.cmd()
        .args(["budget", "copy", "LYO", "--from", "2024", "--to", "2025", "--growth", "10"])
        .assert()
        .success()
        .stdout(contains("Copied 1 lines"));

    env.cmd()
        .args(["budget", "show", "LYO", "--year", "2025"])
        .assert()
        .success()
        .stdout(contains("1 320,00"));
}

#[test]
fn sites_are_looked_up_within_the_client() {
    let env = TestEnv::seeded();
    env.ok(&["clients", "add", "Brasserie SA"]);
    env.ok(&["--client", "Brasserie SA", "entities", "add", "Brasserie Nord", "--code", "NOR"]);

    env.cmd()
        .args(["closure", "record", "NOR", "--date", "2024-03-04", "--mode", "cb:1:1"])
        .assert()
        .failure()
        .stderr(contains("Unknown entity: NOR"));
    env.cmd()
        .args(["--client", "Brasserie SA", "budget", "show", "LYO", "--year", "2024"])
        .assert()
        .failure()
        .stderr(contains("Unknown entity: LYO"));

    env.ok(&["--client", "Brasserie SA", "closure", "record", "NOR", "--date", "2024-03-04", "--mode", "cb:1:1"]);
    env.ok(&["--client", "Brasserie SA", "budget", "set", "NOR", "--year", "2024", "--month", "2", "--category", "bar", "500"]);
    env.cmd()
        .args(["--client", "Brasserie SA", "budget", "show", "NOR", "--year", "2024"])
        .assert()
        .success()
        .stdout(contains("500,00"));
    env.cmd()
        .args(["budget", "show", "LYO", "--year", "2024"])
        .assert()
        .success()
        .stdout(contains("No budget 2024"));
}

#[test]
fn payroll_projection() {
    let env = TestEnv::seeded();
    env.cmd()
        .args(["hr", "person", "add", "Martin", "Claire", "--title", "Chef"])
        .assert()
        .success()
        .stdout(contains("#1"));
    env.ok(&[
        "hr",
        "contract",
        "add",
        "1",
        "--type",
        "cdi",
        "--start",
        "2024-01-01",
        "--gross",
        "3100",
        "--employer-rate",
        "42",
    ]);
    env.ok(&["hr", "assign", "1", "LYO", "--share", "60"]);
    env.cmd()
        .args(["hr", "assign", "1", "LYO", "--share", "50"])
        .assert()
        .failure()
        .stderr(contains("exceed 100%"));

    let out = env.ok(&["hr", "project", "--year", "2024"]);
    assert!(out.contains("Payroll 2024 - Bistro Lyon"));
    assert!(out.contains("1 860,00"));
    assert!(out.contains("unassigned"));
}

#[test]
fn backup_writes_a_copy() {
    let env = TestEnv::seeded();
    let dest = env.tmp.path().join("copy.db");
    env.cmd()
        .args(["backup", "--output", dest.to_str().unwrap()])
        .assert()
        .success()
        .stdout(contains("Backup saved"));
    assert!(dest.exists());
}
