use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use yvault_format::codec;
use yvault_format::{classify, Document, Encoding, Format, SecretString, Value};
use yvault_session::{
    run, Error, Options, Outcome, PasswordKind, ScriptedPrompt, Session,
};

fn password(s: &str) -> SecretString {
    SecretString::new(s.to_string())
}

fn no_editor() -> impl FnMut(&Path) -> yvault_session::Result<()> {
    |_: &Path| -> yvault_session::Result<()> { panic!("editor should not run") }
}

fn sample() -> Document {
    [
        ("user", Value::from("admin")),
        ("password", Value::from("0123:abc")),
    ]
    .into_iter()
    .collect()
}

fn write_doc(dir: &TempDir, name: &str, encoding: Encoding, pw: &str) -> PathBuf {
    let path = dir.path().join(name);
    let raw = codec::dump(&sample(), encoding, &mut password(pw)).unwrap();
    fs::write(&path, raw).unwrap();
    path
}

#[test]
fn view_prints_clear_yaml() {
    let dir = TempDir::new().unwrap();
    let path = write_doc(&dir, "s.yml", Encoding::Full, "pw");
    let before = fs::read(&path).unwrap();

    let outcome = run(&Options::new(&path), ScriptedPrompt::new(["pw"]), &mut no_editor()).unwrap();
    let Outcome::Emitted(bytes) = outcome else {
        panic!("expected emitted output");
    };
    assert!(bytes.starts_with(b"user: admin\n"));
    let shown = codec::load(&bytes, Encoding::Plain, &mut password("unused")).unwrap();
    assert_eq!(shown, sample());
    assert_eq!(fs::read(&path).unwrap(), before);
}

#[test]
fn clear_file_needs_no_password() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("plain.yml");
    fs::write(&path, "user: admin\n").unwrap();

    let session = Session::open(&path, ScriptedPrompt::default()).unwrap();
    assert_eq!(session.source(), Encoding::Plain);
    assert!(session.prompt().asked().is_empty());
}

#[test]
fn mixed_view_as_json() {
    let dir = TempDir::new().unwrap();
    let path = write_doc(&dir, "s.yml", Encoding::Mixed, "pw");
    let options = Options {
        format: Some(Format::Json),
        ..Options::new(&path)
    };

    let Outcome::Emitted(bytes) = run(&options, ScriptedPrompt::new(["pw"]), &mut no_editor()).unwrap() else {
        panic!("expected emitted output");
    };
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["user"], "admin");
    assert_eq!(json["password"], "0123:abc");
}

#[test]
fn in_place_reencode_to_mixed() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("s.yml");
    fs::write(&path, "user: admin\npassword: 0123:abc\n").unwrap();

    let options = Options {
        mode: Some(Encoding::Mixed),
        in_place: true,
        ..Options::new(&path)
    };
    let outcome = run(&options, ScriptedPrompt::new(["pw"]), &mut no_editor()).unwrap();
    assert_eq!(outcome, Outcome::Written(path.clone()));

    let stored = fs::read(&path).unwrap();
    assert_eq!(classify(&stored), Encoding::Mixed);
    let text = String::from_utf8(stored.clone()).unwrap();
    assert!(text.starts_with("user: !vault |\n"));
    assert!(!text.contains("admin"));

    let doc = codec::load(&stored, Encoding::Mixed, &mut password("pw")).unwrap();
    assert_eq!(doc, sample());
}

#[test]
fn output_file_gets_vault() {
    let dir = TempDir::new().unwrap();
    let path = write_doc(&dir, "s.yml", Encoding::Mixed, "pw");
    let out = dir.path().join("sealed.yml");
    let options = Options {
        mode: Some(Encoding::Full),
        output: Some(out.clone()),
        ..Options::new(&path)
    };

    let outcome = run(&options, ScriptedPrompt::new(["pw"]), &mut no_editor()).unwrap();
    assert_eq!(outcome, Outcome::Written(out.clone()));
    let stored = fs::read(&out).unwrap();
    assert!(stored.starts_with(b"$YVAULT;"));
    let doc = codec::load(&stored, Encoding::Full, &mut password("pw")).unwrap();
    assert_eq!(doc, sample());
}

#[test]
fn conflicting_flags_rejected_before_reading() {
    let dir = TempDir::new().unwrap();
    // the file does not exist; validation must fail first
    let missing = dir.path().join("missing.yml");
    let options = Options {
        in_place: true,
        format: Some(Format::Json),
        ..Options::new(&missing)
    };

    let err = run(&options, ScriptedPrompt::default(), &mut no_editor()).unwrap_err();
    assert!(err.is_usage());
    assert!(matches!(
        err,
        Error::IncompatibleOptions { first: "--in-place", second: "--format" }
    ));
}

#[test]
fn rotate_changes_password_in_place() {
    let dir = TempDir::new().unwrap();
    let path = write_doc(&dir, "s.yml", Encoding::Full, "old");
    let options = Options {
        rotate: true,
        ..Options::new(&path)
    };

    let outcome = run(
        &options,
        ScriptedPrompt::new(["old", "new", "new"]),
        &mut no_editor(),
    )
    .unwrap();
    assert_eq!(outcome, Outcome::Written(path.clone()));

    let stored = fs::read(&path).unwrap();
    assert_eq!(classify(&stored), Encoding::Full);
    assert!(codec::load(&stored, Encoding::Full, &mut password("old")).is_err());
    let doc = codec::load(&stored, Encoding::Full, &mut password("new")).unwrap();
    assert_eq!(doc, sample());
}

#[test]
fn rotate_asks_for_new_password_twice() {
    let dir = TempDir::new().unwrap();
    let path = write_doc(&dir, "s.yml", Encoding::Mixed, "old");

    let mut session = Session::open(&path, ScriptedPrompt::new(["old", "new", "new"])).unwrap();
    session.rotate_password().unwrap();
    assert_eq!(
        session.prompt().asked(),
        &[PasswordKind::Current, PasswordKind::New, PasswordKind::Confirm]
    );

    session.save(Encoding::Mixed).unwrap();
    let stored = fs::read(&path).unwrap();
    let doc = codec::load(&stored, Encoding::Mixed, &mut password("new")).unwrap();
    assert_eq!(doc, sample());
}

#[test]
fn rotate_mismatch_leaves_file_untouched() {
    let dir = TempDir::new().unwrap();
    let path = write_doc(&dir, "s.yml", Encoding::Full, "old");
    let before = fs::read(&path).unwrap();
    let options = Options {
        rotate: true,
        ..Options::new(&path)
    };

    let err = run(
        &options,
        ScriptedPrompt::new(["old", "new", "typo"]),
        &mut no_editor(),
    )
    .unwrap_err();
    assert!(matches!(err, Error::PasswordMismatch));
    assert_eq!(fs::read(&path).unwrap(), before);
}

#[test]
fn rotate_to_same_password_is_refused() {
    let dir = TempDir::new().unwrap();
    let path = write_doc(&dir, "s.yml", Encoding::Full, "old");
    let before = fs::read(&path).unwrap();
    let options = Options {
        rotate: true,
        ..Options::new(&path)
    };

    let err = run(
        &options,
        ScriptedPrompt::new(["old", "old", "old"]),
        &mut no_editor(),
    )
    .unwrap_err();
    assert!(matches!(err, Error::NoChange));
    assert_eq!(fs::read(&path).unwrap(), before);
}

#[test]
fn rotate_plain_file_has_nothing_to_rotate() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("plain.yml");
    fs::write(&path, "a: 1\n").unwrap();
    let options = Options {
        rotate: true,
        ..Options::new(&path)
    };

    let prompt = ScriptedPrompt::default();
    let err = run(&options, prompt, &mut no_editor()).unwrap_err();
    assert!(matches!(err, Error::NothingToRotate));
    assert_eq!(fs::read_to_string(&path).unwrap(), "a: 1\n");
}

#[test]
fn wrong_password_aborts_without_writing() {
    let dir = TempDir::new().unwrap();
    let path = write_doc(&dir, "s.yml", Encoding::Full, "right");
    let before = fs::read(&path).unwrap();
    let options = Options {
        mode: Some(Encoding::Plain),
        in_place: true,
        ..Options::new(&path)
    };

    let err = run(&options, ScriptedPrompt::new(["wrong"]), &mut no_editor()).unwrap_err();
    assert!(matches!(
        err,
        Error::Format(yvault_format::Error::InvalidCredential)
    ));
    assert_eq!(fs::read(&path).unwrap(), before);
}

#[test]
fn edit_keeps_source_encoding_and_removes_scratch_file() {
    let dir = TempDir::new().unwrap();
    let path = write_doc(&dir, "s.yml", Encoding::Mixed, "pw");
    let options = Options {
        edit: true,
        ..Options::new(&path)
    };

    let mut scratch_path = None;
    let mut editor = |file: &Path| -> yvault_session::Result<()> {
        let shown = codec::load(&fs::read(file).unwrap(), Encoding::Plain, &mut password("unused")).unwrap();
        assert_eq!(shown, sample());
        fs::write(file, "user: root\npassword: 0123:abc\nport: 5432\n").unwrap();
        scratch_path = Some(file.to_path_buf());
        Ok(())
    };

    let outcome = run(&options, ScriptedPrompt::new(["pw"]), &mut editor).unwrap();
    assert_eq!(outcome, Outcome::Written(path.clone()));
    assert!(!scratch_path.unwrap().exists());

    let stored = fs::read(&path).unwrap();
    assert_eq!(classify(&stored), Encoding::Mixed);
    let doc = codec::load(&stored, Encoding::Mixed, &mut password("pw")).unwrap();
    assert_eq!(doc.get("user"), Some(&Value::from("root")));
    assert_eq!(doc.get("port"), Some(&Value::from(5432_i64)));
}

#[test]
fn failed_edit_removes_scratch_file_and_keeps_original() {
    let dir = TempDir::new().unwrap();
    let path = write_doc(&dir, "s.yml", Encoding::Full, "pw");
    let before = fs::read(&path).unwrap();

    let mut scratch_path = None;
    let mut editor = |file: &Path| -> yvault_session::Result<()> {
        scratch_path = Some(file.to_path_buf());
        fs::write(file, "a: [unclosed\n").unwrap();
        Ok(())
    };

    let mut session = Session::open(&path, ScriptedPrompt::new(["pw"])).unwrap();
    let err = session.edit(&mut editor).unwrap_err();
    assert!(matches!(err, Error::Format(yvault_format::Error::Yaml(_))));
    assert!(!scratch_path.unwrap().exists());
    assert_eq!(session.document(), &sample());
    assert_eq!(fs::read(&path).unwrap(), before);
}

#[test]
fn set_assigns_typed_value_in_place() {
    let dir = TempDir::new().unwrap();
    let path = write_doc(&dir, "s.yml", Encoding::Full, "pw");
    let options = Options {
        set: Some(("db.port".to_string(), "5432".to_string())),
        ..Options::new(&path)
    };

    run(&options, ScriptedPrompt::new(["pw"]), &mut no_editor()).unwrap();

    let stored = fs::read(&path).unwrap();
    assert_eq!(classify(&stored), Encoding::Full);
    let doc = codec::load(&stored, Encoding::Full, &mut password("pw")).unwrap();
    assert_eq!(doc.get_path(&["db", "port"]), Some(&Value::from(5432_i64)));
    assert_eq!(doc.get("user"), Some(&Value::from("admin")));
}

#[test]
fn set_rejects_bad_paths() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("plain.yml");
    fs::write(&path, "user: admin\n").unwrap();

    let mut session = Session::open(&path, ScriptedPrompt::default()).unwrap();
    assert!(matches!(
        session.set("a..b", "x"),
        Err(Error::InvalidKeyPath(_))
    ));
    assert!(matches!(
        session.set("user.name", "x"),
        Err(Error::Format(yvault_format::Error::PathConflict(_)))
    ));
}

#[test]
fn mixed_to_clear_scenario() {
    let dir = TempDir::new().unwrap();
    let envelope = yvault_format::cipher::encrypt(b"abc-123\n", &password("pw")).unwrap();
    let indented: String = envelope.lines().map(|l| format!("  {l}\n")).collect();
    let path = dir.path().join("app.yml");
    fs::write(&path, format!("api_key: !vault |\n{indented}region: us-east-1\n")).unwrap();

    let options = Options {
        mode: Some(Encoding::Plain),
        ..Options::new(&path)
    };
    let outcome = run(&options, ScriptedPrompt::new(["pw"]), &mut no_editor()).unwrap();
    assert_eq!(
        outcome,
        Outcome::Emitted(b"api_key: abc-123\nregion: us-east-1\n".to_vec())
    );
}
