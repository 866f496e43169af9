use std::fs;
use std::path::PathBuf;
use std::process::{self, Stdio};
use std::thread::sleep;
use std::time::{Duration, Instant};

use assert_cmd::Command;
use predicates::str::{contains, diff};
use tempfile::TempDir;

/// Write an image with origin 0x3000 into a fresh directory.
fn image(words: &[u16]) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("program.obj");
    let mut bytes = 0x3000u16.to_be_bytes().to_vec();
    for word in words {
        bytes.extend(word.to_be_bytes());
    }
    fs::write(&path, bytes).unwrap();
    (dir, path)
}

fn string_words(text: &str) -> impl Iterator<Item = u16> + '_ {
    text.bytes().map(u16::from).chain([0])
}

fn lc3vm() -> Command {
    let mut cmd = Command::cargo_bin("lc3vm").unwrap();
    cmd.env_remove("LC3VM_MINIMAL").env_remove("LC3VM_LOG");
    cmd
}

#[test]
fn fails_without_arguments() {
    lc3vm().assert().failure().stderr(contains("Usage"));
}

#[test]
fn runs_hello_world() {
    // LEA R0, #2; PUTS; HALT; "Hello, world!\n"
    let mut words = vec![0xE002, 0xF022, 0xF025];
    words.extend(string_words("Hello, world!\n"));
    let (_dir, path) = image(&words);

    lc3vm()
        .arg(&path)
        .assert()
        .success()
        .stdout(contains("Hello, world!"))
        .stdout(contains("Halted"));
}

#[test]
fn minimal_output_is_program_output_only() {
    let mut words = vec![0xE002, 0xF022, 0xF025];
    words.extend(string_words("Hello, world!\n"));
    let (_dir, path) = image(&words);

    lc3vm()
        .arg(&path)
        .arg("--minimal")
        .assert()
        .success()
        .stdout(diff("Hello, world!\n"));

    lc3vm()
        .arg(&path)
        .env("LC3VM_MINIMAL", "1")
        .assert()
        .success()
        .stdout(diff("Hello, world!\n"));
}

#[test]
fn reads_piped_input() {
    // GETC; OUT; IN; OUT; HALT
    let (_dir, path) = image(&[0xF020, 0xF021, 0xF023, 0xF021, 0xF025]);

    lc3vm()
        .arg(&path)
        .arg("--minimal")
        .write_stdin("ab")
        .assert()
        .success()
        .stdout(diff("aEnter a character: b"));
}

#[test]
fn polls_keyboard_registers() {
    // LDI R1, KBSR; BRzp -2; LDI R0, KBDR; OUT; HALT; KBSR; KBDR
    let (_dir, path) = image(&[0xA204, 0x07FE, 0xA003, 0xF021, 0xF025, 0xFE00, 0xFE02]);

    lc3vm()
        .arg(&path)
        .arg("--minimal")
        .write_stdin("z")
        .assert()
        .success()
        .stdout(diff("z"));
}

#[test]
fn fails_on_missing_file() {
    lc3vm()
        .arg("does/not/exist.obj")
        .arg("--minimal")
        .assert()
        .failure()
        .stderr(contains("Could not read program image"));
}

#[test]
fn fails_on_unaligned_image() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("odd.obj");
    fs::write(&path, [0x30, 0x00, 0xF0]).unwrap();

    lc3vm()
        .arg(&path)
        .arg("--minimal")
        .assert()
        .failure()
        .stderr(contains("not aligned to 16 bits"));
}

#[test]
fn fails_on_reserved_opcode() {
    // ADD R0, R0, #1; RTI
    let (_dir, path) = image(&[0x1021, 0x8000]);

    lc3vm()
        .arg(&path)
        .arg("--minimal")
        .assert()
        .failure()
        .stderr(contains("reserved opcode 0x8 at address 0x3001"));
}

#[test]
fn fails_on_unknown_trap() {
    let (_dir, path) = image(&[0xF0FF]);

    lc3vm()
        .arg(&path)
        .arg("--minimal")
        .assert()
        .failure()
        .stderr(contains("unknown vector of 0xff"));
}

#[test]
fn keyboard_poll_does_not_wait_for_open_input() {
    // LDI R1, KBSR; HALT; KBSR
    let (_dir, path) = image(&[0xA201, 0xF025, 0xFE00]);

    let mut child = process::Command::new(assert_cmd::cargo::cargo_bin("lc3vm"))
        .arg(&path)
        .arg("--minimal")
        .env_remove("LC3VM_MINIMAL")
        .env_remove("LC3VM_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();
    // Held open and empty until the child exits
    let stdin = child.stdin.take();

    let start = Instant::now();
    let status = loop {
        if let Some(status) = child.try_wait().unwrap() {
            break Some(status);
        }
        if start.elapsed() > Duration::from_secs(10) {
            child.kill().unwrap();
            let _ = child.wait();
            break None;
        }
        sleep(Duration::from_millis(20));
    };
    drop(stdin);

    let status = status.expect("lc3vm blocked on an open, empty stdin");
    assert!(status.success());
}
