use datatest_stable::Utf8Path;
use sprig::{run, Host, Options, Value};

#[derive(thiserror::Error, Debug)]
#[error("script datatest failed at {0}")]
pub struct DatatestError(Box<Utf8Path>);

/// A script test file: leading `;` comments, the expected status (`ok` or
/// `error`), `---`, the expected transcript, `---`, then the source.
struct ScriptTest<'a> {
    comments: Vec<&'a str>,
    status: &'a str,
    transcript: Vec<&'a str>,
    source: String,
}

fn read_datatest(contents: &str) -> ScriptTest {
    #[derive(PartialEq, Eq, Debug, Default)]
    enum Section {
        #[default]
        Status,
        Transcript,
        Source,
    }
    let mut section = Section::default();
    let mut test = ScriptTest {
        comments: vec![],
        status: "",
        transcript: vec![],
        source: String::new(),
    };

    for line in contents.lines() {
        match section {
            Section::Status if line.trim_start().starts_with(';') => test.comments.push(line),
            Section::Status | Section::Transcript if line.trim_end() == "---" => {
                section = match section {
                    Section::Status => Section::Transcript,
                    _ => Section::Source,
                };
            }
            Section::Status => {
                if !line.trim().is_empty() {
                    test.status = line.trim();
                }
            }
            Section::Transcript => test.transcript.push(line),
            Section::Source => {
                if !test.source.is_empty() {
                    test.source.push('\n');
                }
                test.source.push_str(line);
            }
        }
    }
    test
}

fn stitch_to_datatest(test: &ScriptTest, status: &str, transcript: &str) -> String {
    let mut lines = test.comments.clone();
    lines.push(status);
    lines.push("---");
    lines.extend(transcript.trim_end().lines());
    lines.push("---");
    lines.push(&test.source);
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

fn script_test(path: &Utf8Path, contents: String) -> datatest_stable::Result<()> {
    let test = read_datatest(&contents);
    let report = run(&test.source, Value::Nil, Options::default(), Host::default());
    let status = if report.ok { "ok" } else { "error" };

    if std::env::var("DATATEST_EXPECT").is_ok() {
        std::fs::write(path, stitch_to_datatest(&test, status, &report.message))?;
        return Ok(());
    }

    let expected = test.transcript.join("\n");
    let mut failed = false;
    if status != test.status {
        println!("error in {path}: expected status {}, got {status}", test.status);
        failed = true;
    }
    if expected.trim_end() != report.message.trim_end() {
        println!(
            "error in {path}: mismatched transcript\n\nGot:\n{}\n\nExpected:\n{}",
            report.message.trim_end(),
            expected.trim_end()
        );
        failed = true;
    }
    if failed {
        Err(DatatestError(Box::from(path)))?
    } else {
        Ok(())
    }
}

datatest_stable::harness! {
    script_test, "test_data", r"^.*\.sprig",
}
