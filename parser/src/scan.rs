//! Left-to-right token scanner.
//!
//! Classifies every input token as a flag token or a positional token
//! without resolving any values. Inline `--name=value` input is split by
//! pushing the value back onto the stream and retrying on the bare name;
//! short clusters (`-abc`) are unrolled the same way.

use std::collections::VecDeque;

use command_runtime_core::{CliError, ErrorKind, ExitCodes, FlagKind, Result};

use crate::input::InputSchema;
use crate::output::Token;

/// Scanner result.
#[derive(Debug, Default)]
pub(crate) struct Scanned {
    pub raw: Vec<Token>,
    /// Scan position of each `Token::Arg`, in order.
    pub arg_positions: Vec<usize>,
    /// Unknown dash-prefixed tokens with their scan position.
    pub non_existent: Vec<(usize, String)>,
}

struct FlagMatch {
    name: String,
    is_long: bool,
    negated: bool,
}

pub(crate) struct Scanner<'a> {
    input: &'a InputSchema,
    exit_codes: &'a ExitCodes,
    argv: VecDeque<String>,
    out: Scanned,
    /// Multiple-value option whose scan window is open.
    current_multiple: Option<String>,
    position: usize,
}

impl<'a> Scanner<'a> {
    pub fn new<S: AsRef<str>>(input: &'a InputSchema, exit_codes: &'a ExitCodes, argv: &[S]) -> Self {
        Self {
            input,
            exit_codes,
            argv: argv.iter().map(|s| s.as_ref().to_string()).collect(),
            out: Scanned::default(),
            current_multiple: None,
            position: 0,
        }
    }

    pub fn scan(mut self) -> Result<Scanned> {
        let mut parsing_flags = true;

        while let Some(token) = self.argv.pop_front() {
            self.position += 1;

            if parsing_flags && token.starts_with('-') && token != "-" {
                if self.input.double_dash_separator && token == "--" {
                    parsing_flags = false;
                    self.current_multiple = None;
                    continue;
                }
                if self.parse_flag(&token)? {
                    continue;
                }
                if self.input.double_dash_separator {
                    self.out.non_existent.push((self.position, token));
                    continue;
                }
            }

            if parsing_flags {
                if let Some(name) = &self.current_multiple {
                    self.out.raw.push(Token::Flag {
                        flag: name.clone(),
                        input: token,
                        negated: false,
                    });
                    continue;
                }
            }

            let arg = self
                .input
                .args
                .get(self.out.arg_positions.len())
                .map(|a| a.name().to_string());
            self.out.arg_positions.push(self.position);
            self.out.raw.push(Token::Arg { arg, input: token });
        }

        Ok(self.out)
    }

    fn parse_flag(&mut self, token: &str) -> Result<bool> {
        let Some(found) = self.find_flag(token) else {
            if let Some(eq) = token.find('=') {
                let (head, value) = (&token[..eq], &token[eq + 1..]);
                self.argv.push_front(value.to_string());
                let parsed = self.parse_flag(head)?;
                if !parsed {
                    self.argv.pop_front();
                }
                return Ok(parsed);
            }
            return Ok(false);
        };

        let flag = &self.input.flags[found.name.as_str()];
        match flag.descriptor.kind {
            FlagKind::Option => {
                if !flag.descriptor.multiple && self.out.raw.iter().any(|t| t.is_flag(&found.name))
                {
                    return Err(CliError::new(
                        ErrorKind::FlagRepeated,
                        format!("Flag --{} can only be specified once", found.name),
                        self.exit_codes,
                    ));
                }
                self.current_multiple = flag.descriptor.multiple.then(|| found.name.clone());

                let value = if found.is_long {
                    self.argv.pop_front()
                } else {
                    let rest = short_rest(token);
                    if rest.is_empty() {
                        self.argv.pop_front()
                    } else {
                        Some(rest.strip_prefix('=').unwrap_or(rest).to_string())
                    }
                };
                let Some(value) = value else {
                    return Err(CliError::new(
                        ErrorKind::FlagValueMissing,
                        format!("Flag --{} expects a value", found.name),
                        self.exit_codes,
                    ));
                };
                self.out.raw.push(Token::Flag {
                    flag: found.name,
                    input: value,
                    negated: false,
                });
            }
            FlagKind::Boolean => {
                self.current_multiple = None;
                let rest = if found.is_long { "" } else { short_rest(token) };
                if !rest.is_empty() {
                    self.argv.push_front(format!("-{rest}"));
                }
                self.out.raw.push(Token::Flag {
                    flag: found.name,
                    input: token.to_string(),
                    negated: found.negated,
                });
            }
        }
        Ok(true)
    }

    fn find_flag(&self, token: &str) -> Option<FlagMatch> {
        if let Some(long) = token.strip_prefix("--") {
            return self.find_long_flag(long);
        }
        let short = token.strip_prefix('-')?.chars().next()?;
        self.input.find_short(short).map(|name| FlagMatch {
            name: name.to_string(),
            is_long: false,
            negated: false,
        })
    }

    fn find_long_flag(&self, long: &str) -> Option<FlagMatch> {
        if let Some(name) = self.input.find_long(long) {
            return Some(FlagMatch {
                name: name.to_string(),
                is_long: true,
                negated: false,
            });
        }
        let positive = long.strip_prefix("no-")?;
        let name = self.input.find_long(positive)?;
        let flag = &self.input.flags[name];
        (flag.descriptor.kind == FlagKind::Boolean && flag.descriptor.allow_no).then(|| FlagMatch {
            name: name.to_string(),
            is_long: true,
            negated: true,
        })
    }
}

/// Text after `-c` in a short token.
fn short_rest(token: &str) -> &str {
    let mut chars = token.char_indices().skip(1);
    match chars.next() {
        Some((i, c)) => &token[i + c.len_utf8()..],
        None => "",
    }
}
