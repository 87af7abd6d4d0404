use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use anyhow::{Context, anyhow};
use shell_engine::io_adapters::MemHandle;
use shell_engine::{
    CliConfig, Command, Incomplete, Interpreter, LineOutcome, Outcome, Output, StringsCompleter,
};

fn shell(config: CliConfig, commands: Vec<Command>) -> (Interpreter, MemHandle) {
    let (output, handle) = Output::memory();
    let shell = Interpreter::builder(config.with_history_file(None))
        .commands(commands)
        .output(output)
        .build()
        .unwrap();
    (shell, handle)
}

fn remote() -> Command {
    Command::builder("remote")
        .alias("r")
        .description("Manage remotes")
        .sub_command_with("add", |b| {
            b.parameter(|p| p.name("name"))
                .parameter(|p| p.name("url").nullable())
                .parameters_action(|command, params, env| {
                    let name = params[0].value::<String>().cloned().unwrap_or_default();
                    let url = params[1]
                        .value::<String>()
                        .cloned()
                        .unwrap_or_else(|| "<none>".to_string());
                    writeln!(env.output(), "{} {name} {url}", command.qualified_name())?;
                    Ok(())
                })
        })
        .build()
        .unwrap()
}

#[test]
fn test_nested_command_with_parameters() {
    let (shell, out) = shell(CliConfig::new("it"), vec![remote()]);
    assert_eq!(
        shell.execute_line("r add origin 'git@host:repo.git'"),
        LineOutcome::Executed(Outcome::Completed)
    );
    assert_eq!(out.take(), "remote.add origin git@host:repo.git\n");

    shell.execute_line("remote add upstream null");
    assert_eq!(out.take(), "remote.add upstream <none>\n");

    shell.execute_line("remote add upstream");
    assert_eq!(out.take(), "remote.add upstream <none>\n");
}

#[test]
fn test_group_without_action_is_not_implemented() {
    let (shell, out) = shell(CliConfig::new("it"), vec![remote()]);
    shell.execute_line("remote list");
    assert_eq!(out.contents(), "remote list is not implemented\n");
}

#[test]
fn test_parameter_errors_are_reported() {
    let add = Command::builder("add")
        .parameter(|p| p.name("a").parse_as::<i32>())
        .parameters_action(|_, _, _| Ok(()))
        .build()
        .unwrap();
    let (shell, out) = shell(CliConfig::new("it"), vec![add]);
    assert_eq!(shell.execute_line("add one"), LineOutcome::Executed(Outcome::Completed));
    let text = out.contents();
    assert!(text.starts_with("Error parsing parameter a: invalid value 'one'"), "{text}");
}

#[test]
fn test_action_failures_are_reported_and_loop_continues() {
    let fail = Command::builder("fail")
        .run(|_| Err(anyhow!("no such file")).context("loading settings"))
        .build()
        .unwrap();
    let ok = Command::builder("ok")
        .run(|env| {
            writeln!(env.output(), "ok")?;
            Ok(())
        })
        .build()
        .unwrap();
    let (shell, out) = shell(CliConfig::new("it"), vec![fail, ok]);

    assert_eq!(shell.execute_line("fail  now"), LineOutcome::Executed(Outcome::Failed));
    assert_eq!(
        out.take(),
        "Error executing 'fail(fail  now)': loading settings\n    caused by: no such file\n"
    );
    assert_eq!(shell.execute_line("ok"), LineOutcome::Executed(Outcome::Completed));
    assert_eq!(out.take(), "ok\n");
}

#[test]
fn test_incomplete_lines_are_syntax_errors() {
    let (shell, out) = shell(CliConfig::new("it"), vec![remote()]);
    assert_eq!(
        shell.execute_line("remote add x\\"),
        LineOutcome::SyntaxError(Incomplete::EscapedNewline)
    );
    assert_eq!(out.take(), "Syntax error: escaped new line\n");
    assert!(matches!(
        shell.execute_line("remote add \"x"),
        LineOutcome::SyntaxError(Incomplete::MissingClosingQuote { quote: '"' })
    ));
}

#[test]
fn test_brackets_must_balance_when_enabled() {
    use shell_engine::{Bracket, TokenizerConfig};

    let config = CliConfig::new("it")
        .with_tokenizer(TokenizerConfig::default().with_brackets(&[Bracket::Round]));
    let (shell, out) = shell(config, vec![remote()]);
    assert!(matches!(
        shell.execute_line("remote add (x"),
        LineOutcome::SyntaxError(Incomplete::MissingClosingBrackets { .. })
    ));
    assert!(out.take().starts_with("Syntax error: missing closing brackets"));
    assert_eq!(
        shell.execute_line("remote add (x)"),
        LineOutcome::Executed(Outcome::Completed)
    );
}

#[test]
fn test_help_for_unknown_path_lists_root() {
    let (shell, out) = shell(CliConfig::new("it"), vec![remote()]);
    shell.execute_line("help nothing");
    let text = out.contents();
    assert!(text.starts_with("Commands:\n"), "{text}");
    assert!(text.contains("  remote : Manage remotes\n"), "{text}");
}

#[test]
fn test_interrupt_stops_running_command() {
    let started = Arc::new(AtomicUsize::new(0));
    let wait = {
        let started = Arc::clone(&started);
        Command::builder("wait")
            .run(move |env| {
                started.fetch_add(1, Ordering::SeqCst);
                env.cancel().sleep(Duration::from_secs(30))?;
                Ok(())
            })
            .build()
            .unwrap()
    };
    let (shell, out) = shell(CliConfig::new("it"), vec![wait]);
    let interrupter = shell.interrupter();
    let poker = thread::spawn(move || {
        while started.load(Ordering::SeqCst) == 0 {
            thread::sleep(Duration::from_millis(5));
        }
        interrupter.interrupt();
    });

    assert_eq!(shell.execute_line("wait"), LineOutcome::Executed(Outcome::Cancelled));
    poker.join().unwrap();
    assert_eq!(out.contents(), "");
}

#[test]
fn test_completion_tree_covers_parameters_and_help() {
    let pick = Command::builder("pick")
        .parameter(|p| p.completer(StringsCompleter::new(["alpha", "beta"])))
        .run(|_| Ok(()))
        .build()
        .unwrap();
    let (shell, _) = shell(CliConfig::new("it"), vec![pick, remote()]);
    let tree = shell.completion_tree();
    assert_eq!(tree.candidates(&["pick"], "a"), vec!["alpha"]);
    assert_eq!(tree.candidates(&["help"], "p"), vec!["pick"]);
    assert_eq!(tree.candidates(&["r", "add", "origin"], "n"), vec!["n", "null"]);
    assert_eq!(tree.candidates(&[], "q"), vec!["quit"]);
}
