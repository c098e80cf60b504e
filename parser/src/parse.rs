//! Value resolution on top of the scanner.
//!
//! Positional tokens are matched to declared args (with a one-shot stdin
//! fallback), then flags are resolved in declaration order: explicit input
//! first, then `env` fallbacks, then defaults. Defaults see every flag
//! resolved before them and are passed through the flag's `parse` function
//! so they get the same coercion as user input.

use std::sync::Arc;

use command_runtime_core::{CliError, ErrorKind, ExitCodes, FlagKind, Result};
use indexmap::IndexMap;
use serde_json::Value;
use tracing::debug;

use crate::input::{Arg, DefaultFn, Flag, InputSchema, ParseContext, ParseFn};
use crate::output::{Metadata, ParseOutput, Token, ValueMetadata};
use crate::scan::{Scanned, Scanner};
use crate::source::{EnvSource, NoStdin, ProcessEnv, ProcessStdin, StdinSource};

const TRUTHY: [&str; 4] = ["true", "1", "yes", "y"];

/// Parses a token list against an [`InputSchema`].
///
/// # Examples
///
/// ```
/// use command_runtime_core::{ArgDescriptor, FlagDescriptor};
/// use command_runtime_parser::{InputSchema, NoStdin, Parser};
/// use serde_json::json;
///
/// # tokio_test_block(async {
/// let input = InputSchema::new()
///     .flag(FlagDescriptor::boolean("force").with_char('f'))
///     .flag(FlagDescriptor::option("name").with_default("world"))
///     .arg(ArgDescriptor::required("target"));
///
/// let out = Parser::new(&input)
///     .stdin(NoStdin)
///     .parse(&["-f", "prod"])
///     .await
///     .unwrap();
///
/// assert_eq!(out.flags["force"], json!(true));
/// assert_eq!(out.flags["name"], json!("world"));
/// assert!(out.metadata.flag_from_default("name"));
/// assert_eq!(out.args["target"], json!("prod"));
/// # });
/// # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap().block_on(f)
/// # }
/// ```
pub struct Parser<'a> {
    input: &'a InputSchema,
    exit_codes: ExitCodes,
    env: Arc<dyn EnvSource>,
    stdin: Arc<dyn StdinSource>,
}

impl<'a> Parser<'a> {
    /// Parser over the process environment and the real stdin.
    pub fn new(input: &'a InputSchema) -> Self {
        Self {
            input,
            exit_codes: ExitCodes::default(),
            env: Arc::new(ProcessEnv),
            stdin: Arc::new(ProcessStdin::default()),
        }
    }

    /// Exit-code overrides applied to every error raised.
    pub fn exit_codes(mut self, exit_codes: &ExitCodes) -> Self {
        self.exit_codes = exit_codes.clone();
        self
    }

    pub fn env(mut self, env: impl EnvSource + 'static) -> Self {
        self.env = Arc::new(env);
        self
    }

    pub fn stdin(mut self, stdin: impl StdinSource + 'static) -> Self {
        self.stdin = Arc::new(stdin);
        self
    }

    /// Disables the stdin fallback.
    pub fn without_stdin(self) -> Self {
        self.stdin(NoStdin)
    }

    /// Scans and resolves `argv`.
    ///
    /// # Errors
    ///
    /// Returns a [`CliError`] of kind `FlagRepeated`, `FlagValueMissing`,
    /// `FlagInvalidOption`, `ArgInvalidOption` or `FailedParse`.
    pub async fn parse<S: AsRef<str>>(&self, argv: &[S]) -> Result<ParseOutput> {
        let scanned = Scanner::new(self.input, &self.exit_codes, argv).scan()?;
        let mut resolver = Resolver {
            parser: self,
            ctx: ParseContext {
                context: self.input.context.clone(),
                ..Default::default()
            },
            metadata: Metadata::default(),
        };

        let argv = resolver.resolve_args(&scanned).await?;
        resolver.resolve_flags(&scanned.raw).await?;

        debug!(
            args = resolver.ctx.args.len(),
            flags = resolver.ctx.flags.len(),
            argv = argv.len(),
            "Parsed input"
        );

        Ok(ParseOutput {
            args: resolver.ctx.args,
            flags: resolver.ctx.flags,
            argv,
            raw: scanned.raw,
            metadata: resolver.metadata,
            non_existent_flags: scanned.non_existent.into_iter().map(|(_, t)| t).collect(),
        })
    }
}

/// Parses with the process environment and stdin and default exit codes.
pub async fn parse<S: AsRef<str>>(argv: &[S], input: &InputSchema) -> Result<ParseOutput> {
    Parser::new(input).parse(argv).await
}

struct Resolver<'p, 'a> {
    parser: &'p Parser<'a>,
    ctx: ParseContext,
    metadata: Metadata,
}

impl Resolver<'_, '_> {
    fn error(&self, kind: ErrorKind, message: String) -> CliError {
        CliError::new(kind, message, &self.parser.exit_codes)
    }

    async fn resolve_args(&mut self, scanned: &Scanned) -> Result<Vec<Value>> {
        let tokens: Vec<(usize, Option<&str>, &str)> = scanned
            .raw
            .iter()
            .filter_map(|t| match t {
                Token::Arg { arg, input } => Some((arg.as_deref(), input.as_str())),
                Token::Flag { .. } => None,
            })
            .zip(&scanned.arg_positions)
            .map(|((arg, input), pos)| (*pos, arg, input))
            .collect();

        let mut argv: Vec<(usize, Value)> = Vec::new();
        let mut stdin_read = false;

        for arg in &self.parser.input.args {
            let name = arg.name();
            if let Some(&(pos, _, input)) = tokens.iter().find(|(_, a, _)| *a == Some(name)) {
                if let Some(options) = &arg.descriptor.options {
                    if !options.iter().any(|o| o == input) {
                        return Err(self.error(
                            ErrorKind::ArgInvalidOption,
                            format!("Expected {input} to be one of: {}", options.join(", ")),
                        ));
                    }
                }
                let value = self.parse_arg(arg, input.to_string()).await?;
                argv.push((pos, value.clone()));
                self.ctx.args.insert(name.to_string(), value);
            } else if !arg.descriptor.ignore_stdin && !stdin_read {
                stdin_read = true;
                if let Some(piped) = self.parser.stdin.read().await {
                    let piped = piped.trim();
                    if !piped.is_empty() {
                        debug!(arg = name, "Filled arg from stdin");
                        let value = self.parse_arg(arg, piped.to_string()).await?;
                        argv.push((usize::MAX, value.clone()));
                        self.ctx.args.insert(name.to_string(), value);
                    }
                }
            }

            if !self.ctx.args.contains_key(name) {
                if let Some(value) = self
                    .default_value(arg.default_fn.as_ref(), arg.descriptor.default.as_ref())
                    .await
                    .map_err(|e| self.error(ErrorKind::FailedParse, format!("Default for {name}: {e}")))?
                {
                    let value = self.coerce_default(arg.parse.as_ref(), name, value).await?;
                    self.ctx.args.insert(name.to_string(), value);
                    self.metadata
                        .args
                        .insert(name.to_string(), ValueMetadata { set_from_default: true });
                }
            }
        }

        for &(pos, arg, input) in &tokens {
            let consumed = arg.is_some_and(|a| self.ctx.args.contains_key(a));
            if !consumed {
                argv.push((pos, Value::String(input.to_string())));
            }
        }

        if !self.parser.input.strict {
            for (pos, token) in &scanned.non_existent {
                argv.push((*pos, Value::String(token.clone())));
            }
        }

        argv.sort_by_key(|(pos, _)| *pos);
        Ok(argv.into_iter().map(|(_, v)| v).collect())
    }

    async fn resolve_flags(&mut self, raw: &[Token]) -> Result<()> {
        let mut by_flag: IndexMap<&str, Vec<&Token>> = IndexMap::new();
        for token in raw {
            if let Token::Flag { flag, .. } = token {
                by_flag.entry(flag.as_str()).or_default().push(token);
            }
        }

        let mut pending_defaults: Vec<&Flag> = Vec::new();
        for (name, flag) in &self.parser.input.flags {
            let value = match by_flag.get(name.as_str()) {
                Some(tokens) => Some(self.flag_from_tokens(flag, tokens).await?),
                None => self.flag_from_env(flag).await?,
            };
            match value {
                Some(value) => {
                    self.ctx.flags.insert(name.clone(), value);
                }
                None if flag.has_default() => pending_defaults.push(flag),
                None => {}
            }
        }

        for flag in pending_defaults {
            let name = flag.name();
            let Some(value) = self
                .default_value(flag.default_fn.as_ref(), flag.descriptor.default.as_ref())
                .await
                .map_err(|e| self.error(ErrorKind::FailedParse, format!("Default for --{name}: {e}")))?
            else {
                continue;
            };
            let value = self.coerce_default(flag.parse.as_ref(), name, value).await?;
            self.ctx.flags.insert(name.to_string(), value);
            self.metadata
                .flags
                .insert(name.to_string(), ValueMetadata { set_from_default: true });
        }

        Ok(())
    }

    async fn flag_from_tokens(&self, flag: &Flag, tokens: &[&Token]) -> Result<Value> {
        let descriptor = &flag.descriptor;
        match descriptor.kind {
            FlagKind::Boolean => {
                let negated = tokens
                    .last()
                    .is_some_and(|t| matches!(t, Token::Flag { negated: true, .. }));
                Ok(Value::Bool(!negated))
            }
            FlagKind::Option if descriptor.multiple => {
                let mut values = Vec::new();
                for token in tokens {
                    for piece in split_delimited(token.input(), descriptor.delimiter) {
                        self.check_flag_option(flag, &piece)?;
                        values.push(self.parse_flag_input(flag, piece).await?);
                    }
                }
                Ok(Value::Array(values))
            }
            FlagKind::Option => {
                let input = tokens.last().map(|t| t.input()).unwrap_or_default();
                self.check_flag_option(flag, input)?;
                self.parse_flag_input(flag, input.to_string()).await
            }
        }
    }

    async fn flag_from_env(&self, flag: &Flag) -> Result<Option<Value>> {
        let Some(var) = &flag.descriptor.env else {
            return Ok(None);
        };
        let Some(raw) = self.parser.env.var(var) else {
            return Ok(None);
        };
        debug!(flag = flag.name(), env = %var, "Using environment fallback");
        match flag.descriptor.kind {
            FlagKind::Boolean => {
                let truthy = TRUTHY.contains(&raw.trim().to_ascii_lowercase().as_str());
                Ok(Some(Value::Bool(truthy)))
            }
            FlagKind::Option if raw.is_empty() => Ok(None),
            FlagKind::Option if flag.descriptor.multiple => {
                let mut values = Vec::new();
                for piece in split_delimited(&raw, flag.descriptor.delimiter) {
                    self.check_flag_option(flag, &piece)?;
                    values.push(self.parse_flag_input(flag, piece).await?);
                }
                Ok(Some(Value::Array(values)))
            }
            FlagKind::Option => {
                self.check_flag_option(flag, &raw)?;
                Ok(Some(self.parse_flag_input(flag, raw).await?))
            }
        }
    }

    fn check_flag_option(&self, flag: &Flag, input: &str) -> Result<()> {
        match &flag.descriptor.options {
            Some(options) if !options.iter().any(|o| o == input) => Err(self.error(
                ErrorKind::FlagInvalidOption,
                format!(
                    "Expected --{}={input} to be one of: {}",
                    flag.name(),
                    options.join(", ")
                ),
            )),
            _ => Ok(()),
        }
    }

    async fn parse_flag_input(&self, flag: &Flag, input: String) -> Result<Value> {
        self.run_parse(flag.parse.as_ref(), &format!("--{}", flag.name()), input)
            .await
    }

    async fn parse_arg(&self, arg: &Arg, input: String) -> Result<Value> {
        self.run_parse(arg.parse.as_ref(), arg.name(), input).await
    }

    async fn run_parse(&self, parse: Option<&ParseFn>, label: &str, input: String) -> Result<Value> {
        let Some(parse) = parse else {
            return Ok(Value::String(input));
        };
        parse(input.clone(), self.ctx.clone()).await.map_err(|e| {
            self.error(
                ErrorKind::FailedParse,
                format!("Parsing {label}\n\t{input}\n\t{e}"),
            )
        })
    }

    async fn default_value(
        &self,
        default_fn: Option<&DefaultFn>,
        fixed: Option<&Value>,
    ) -> std::result::Result<Option<Value>, crate::FnError> {
        match default_fn {
            Some(f) => f(self.ctx.clone()).await,
            None => Ok(fixed.cloned()),
        }
    }

    /// Runs string defaults (or each string in an array default) through
    /// `parse`. Options are not checked for defaults.
    async fn coerce_default(
        &self,
        parse: Option<&ParseFn>,
        name: &str,
        value: Value,
    ) -> Result<Value> {
        if parse.is_none() {
            return Ok(value);
        }
        match value {
            Value::String(s) => self.run_parse(parse, name, s).await,
            Value::Array(items) => {
                let mut parsed = Vec::with_capacity(items.len());
                for item in items {
                    parsed.push(match item {
                        Value::String(s) => self.run_parse(parse, name, s).await?,
                        other => other,
                    });
                }
                Ok(Value::Array(parsed))
            }
            other => Ok(other),
        }
    }
}

fn split_delimited(input: &str, delimiter: Option<char>) -> Vec<String> {
    match delimiter {
        Some(d) => input
            .split(d)
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect(),
        None => vec![input.to_string()],
    }
}
