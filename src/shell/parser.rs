use log::debug;

use crate::shell::ast::{Pipeline, Redirect, Stage};

/// Parse one command line: split into pipeline stages on unquoted `|`,
/// then tokenize each stage independently.
///
/// A blank line parses to an empty pipeline. Unterminated quotes are
/// tolerated: the open quote state is simply dropped at end of input and
/// the pending token flushed.
pub fn parse_command_line(line: &str) -> Pipeline {
    let stages: Vec<Stage> = split_stages(line)
        .iter()
        .map(|segment| parse_stage(segment))
        .filter(|stage| !stage.argv.is_empty())
        .collect();
    debug!("parsed {} stage(s)", stages.len());
    Pipeline { stages }
}

/// Split on unquoted `|`, preserving quote characters for the per-stage
/// tokenizer.
fn split_stages(line: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_single = false;
    let mut in_double = false;

    for c in line.chars() {
        match c {
            '\'' if !in_double => {
                in_single = !in_single;
                current.push(c);
            }
            '"' if !in_single => {
                in_double = !in_double;
                current.push(c);
            }
            '|' if !in_single && !in_double => parts.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    parts.push(current);
    parts
}

/// Tokenize one stage.
///
/// Single quotes make everything literal until the matching quote; double
/// quotes additionally keep `'` literal. An unquoted space terminates the
/// current token (empty tokens are not emitted). `>`/`>>` and the
/// fd-prefixed forms `1>`, `1>>`, `2>`, `2>>` start a redirect; the fd
/// digit is only recognized at token start. Once a redirect target has
/// been collected, the remainder of the stage is scanned for further
/// redirect operators only, never for more arguments.
fn parse_stage(input: &str) -> Stage {
    let mut stage = Stage::default();
    let mut current = String::new();
    let mut in_single = false;
    let mut in_double = false;
    let mut args_done = false;

    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\'' && !in_double {
            in_single = !in_single;
            continue;
        }
        if c == '"' && !in_single {
            in_double = !in_double;
            continue;
        }
        if !in_single && !in_double {
            let fd = if c == '>' {
                Some(1)
            } else if (c == '1' || c == '2') && current.is_empty() && chars.peek() == Some(&'>') {
                chars.next();
                Some(if c == '1' { 1 } else { 2 })
            } else {
                None
            };

            if let Some(fd) = fd {
                let append = chars.peek() == Some(&'>');
                if append {
                    chars.next();
                }
                if !current.is_empty() {
                    if !args_done {
                        stage.argv.push(std::mem::take(&mut current));
                    } else {
                        current.clear();
                    }
                }
                while chars.peek() == Some(&' ') {
                    chars.next();
                }
                let mut target = String::new();
                while let Some(&t) = chars.peek() {
                    if t == ' ' {
                        break;
                    }
                    target.push(t);
                    chars.next();
                }
                let redirect = Redirect { target, append };
                if fd == 2 {
                    stage.stderr_redirect = Some(redirect);
                } else {
                    stage.stdout_redirect = Some(redirect);
                }
                args_done = true;
                continue;
            }

            if c == ' ' {
                if !current.is_empty() {
                    if !args_done {
                        stage.argv.push(std::mem::take(&mut current));
                    } else {
                        current.clear();
                    }
                }
                continue;
            }
        }
        current.push(c);
    }

    if !current.is_empty() && !args_done {
        stage.argv.push(current);
    }
    stage
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(line: &str) -> Vec<String> {
        let pipeline = parse_command_line(line);
        assert_eq!(pipeline.stages.len(), 1, "expected a single stage");
        pipeline.stages[0].argv.clone()
    }

    #[test]
    fn tokenizes_on_spaces() {
        assert_eq!(argv("echo hello world"), ["echo", "hello", "world"]);
        assert_eq!(argv("  ls   -l  "), ["ls", "-l"]);
    }

    #[test]
    fn single_quotes_preserve_spaces() {
        assert_eq!(argv("echo 'a b' c"), ["echo", "a b", "c"]);
    }

    #[test]
    fn double_quotes_keep_single_quotes_literal() {
        assert_eq!(argv("echo \"it's fine\""), ["echo", "it's fine"]);
    }

    #[test]
    fn unterminated_quote_is_dropped_at_end_of_input() {
        assert_eq!(argv("echo 'abc"), ["echo", "abc"]);
        assert_eq!(argv("echo \"x y"), ["echo", "x y"]);
    }

    #[test]
    fn rejoining_tokens_reproduces_the_unquoted_line() {
        for line in ["echo a b", "ls -l /tmp", "cat one two three"] {
            assert_eq!(argv(line).join(" "), line);
        }
    }

    #[test]
    fn output_redirect_truncate() {
        let pipeline = parse_command_line("cmd > out.txt");
        let stage = &pipeline.stages[0];
        assert_eq!(stage.argv, ["cmd"]);
        assert_eq!(
            stage.stdout_redirect,
            Some(Redirect {
                target: "out.txt".into(),
                append: false
            })
        );
        assert_eq!(stage.stderr_redirect, None);
    }

    #[test]
    fn output_redirect_append() {
        let stage = &parse_command_line("cmd >> log.txt").stages[0];
        assert!(stage.stdout_redirect.as_ref().unwrap().append);

        let stage = &parse_command_line("cmd 1>> log.txt").stages[0];
        assert!(stage.stdout_redirect.as_ref().unwrap().append);
    }

    #[test]
    fn stderr_redirect() {
        let stage = &parse_command_line("cmd 2> err.txt").stages[0];
        assert_eq!(stage.argv, ["cmd"]);
        assert_eq!(
            stage.stderr_redirect,
            Some(Redirect {
                target: "err.txt".into(),
                append: false
            })
        );
        assert_eq!(stage.stdout_redirect, None);
    }

    #[test]
    fn both_redirects_on_one_stage() {
        let stage = &parse_command_line("cmd arg > out.txt 2>> err.txt").stages[0];
        assert_eq!(stage.argv, ["cmd", "arg"]);
        assert_eq!(stage.stdout_redirect.as_ref().unwrap().target, "out.txt");
        let err = stage.stderr_redirect.as_ref().unwrap();
        assert_eq!(err.target, "err.txt");
        assert!(err.append);
    }

    #[test]
    fn redirect_terminates_argument_scanning() {
        let stage = &parse_command_line("cmd > out.txt extra words").stages[0];
        assert_eq!(stage.argv, ["cmd"]);
        assert_eq!(stage.stdout_redirect.as_ref().unwrap().target, "out.txt");
    }

    #[test]
    fn redirect_glued_to_argument() {
        let stage = &parse_command_line("echo a>b").stages[0];
        assert_eq!(stage.argv, ["echo", "a"]);
        assert_eq!(stage.stdout_redirect.as_ref().unwrap().target, "b");
    }

    #[test]
    fn fd_digit_only_recognized_at_token_start() {
        // "12" here is an argument, not a file descriptor
        let stage = &parse_command_line("echo 12> out.txt").stages[0];
        assert_eq!(stage.argv, ["echo", "12"]);
        assert_eq!(stage.stdout_redirect.as_ref().unwrap().target, "out.txt");
    }

    #[test]
    fn pipeline_splits_into_stages() {
        let pipeline = parse_command_line("a | b | c");
        let names: Vec<&str> = pipeline.stages.iter().map(|s| s.name()).collect();
        assert_eq!(names, ["a", "b", "c"]);
    }

    #[test]
    fn quoted_pipe_does_not_split() {
        let pipeline = parse_command_line("echo 'a | b'");
        assert_eq!(pipeline.stages.len(), 1);
        assert_eq!(pipeline.stages[0].argv, ["echo", "a | b"]);
    }

    #[test]
    fn blank_line_parses_to_empty_pipeline() {
        assert!(parse_command_line("").is_empty());
        assert!(parse_command_line("   ").is_empty());
    }

    #[test]
    fn quote_markers_produce_no_empty_tokens() {
        assert_eq!(argv("echo '' end"), ["echo", "end"]);
    }
}
