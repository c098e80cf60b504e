//! Post-parse validation.
//!
//! Checks run in a fixed order and the first failing category raises:
//!
//! 1. unknown flags (strict only)
//! 2. unexpected positional args (strict only)
//! 3. args spec, then missing required args
//! 4. required flags
//! 5. `depends_on`
//! 6. `exclusive` (values that came from defaults never conflict)
//! 7. `exactly_one`
//! 8. relationships (`all` / `some` / `none`, with optional predicates)
//!
//! Within one category every failing flag is reported in a single error.
//! Relationship predicates are awaited one at a time in declaration order.

use command_runtime_core::{CliError, ErrorKind, ExitCodes, RelationshipKind, Result};
use indexmap::IndexSet;
use serde_json::Value;
use tracing::debug;

use crate::input::{Flag, FlagRelationship, InputSchema, ParseContext};
use crate::output::ParseOutput;

/// Validates with default exit codes.
pub async fn validate(input: &InputSchema, output: &ParseOutput) -> Result<()> {
    Validator::new(input, output).run().await
}

/// Cross-field validator for one parse result.
pub struct Validator<'a> {
    input: &'a InputSchema,
    output: &'a ParseOutput,
    exit_codes: ExitCodes,
}

impl<'a> Validator<'a> {
    pub fn new(input: &'a InputSchema, output: &'a ParseOutput) -> Self {
        Self {
            input,
            output,
            exit_codes: ExitCodes::default(),
        }
    }

    pub fn exit_codes(mut self, exit_codes: &ExitCodes) -> Self {
        self.exit_codes = exit_codes.clone();
        self
    }

    /// Runs every check; returns the first violated category as an error.
    pub async fn run(&self) -> Result<()> {
        self.validate_args()?;
        self.validate_required_flags()?;
        self.fail_on(ErrorKind::FailedFlagValidation, self.depends_on_failures())?;
        self.fail_on(ErrorKind::FailedFlagValidation, self.exclusive_failures())?;
        self.fail_on(ErrorKind::FailedFlagValidation, self.exactly_one_failures())?;
        let relationship_failures = self.relationship_failures().await;
        self.fail_on(ErrorKind::FailedFlagValidation, relationship_failures)
    }

    fn error(&self, kind: ErrorKind, message: String) -> CliError {
        CliError::new(kind, message, &self.exit_codes)
    }

    fn fail_on(&self, kind: ErrorKind, reasons: IndexSet<String>) -> Result<()> {
        if reasons.is_empty() {
            return Ok(());
        }
        debug!(kind = %kind, count = reasons.len(), "Flag validation failed");
        let reasons: Vec<String> = reasons.into_iter().collect();
        Err(self.error(kind, reasons.join("\n")))
    }

    fn validate_args(&self) -> Result<()> {
        let output = self.output;

        if self.input.strict && !output.non_existent_flags.is_empty() {
            let s = if output.non_existent_flags.len() == 1 { "" } else { "s" };
            return Err(self.error(
                ErrorKind::NonExistentFlag,
                format!(
                    "Nonexistent flag{s}: {}\nSee more help with --help",
                    output.non_existent_flags.join(", ")
                ),
            ));
        }

        let max_args = self.input.args.len();
        if self.input.strict && output.argv.len() > max_args {
            let extras: Vec<String> = output.argv[max_args..].iter().map(display_value).collect();
            let s = if extras.len() == 1 { "" } else { "s" };
            return Err(self.error(
                ErrorKind::UnexpectedArgs,
                format!(
                    "Unexpected argument{s}: {}\nSee more help with --help",
                    extras.join(", ")
                ),
            ));
        }

        let mut has_optional = false;
        for arg in &self.input.args {
            if !arg.descriptor.required {
                has_optional = true;
            } else if has_optional {
                return Err(self.error(
                    ErrorKind::InvalidArgsSpec,
                    format!(
                        "Invalid argument spec: required arg {} cannot follow an optional arg",
                        arg.name()
                    ),
                ));
            }
        }

        let missing: Vec<String> = self
            .input
            .args
            .iter()
            .filter(|a| a.descriptor.required && !output.has_arg(a.name()))
            .map(|a| match &a.descriptor.description {
                Some(desc) => format!("{}  {desc}", a.name()),
                None => a.name().to_string(),
            })
            .collect();
        if missing.is_empty() {
            return Ok(());
        }

        let s = if missing.len() == 1 { "" } else { "s" };
        let mut message = format!(
            "Missing {} required arg{s}:\n{}",
            missing.len(),
            missing.join("\n")
        );
        let multiple = self.input.multiple_flag_names();
        if !multiple.is_empty() {
            let names: Vec<String> = multiple.iter().map(|n| format!("--{n}")).collect();
            message.push_str(&format!(
                "\nNote: {} allow{} multiple values. Use '--' to end the list before positional args.",
                names.join(", "),
                if names.len() == 1 { "s" } else { "" }
            ));
        }
        message.push_str("\nSee more help with --help");
        Err(self.error(ErrorKind::RequiredArgs, message))
    }

    fn validate_required_flags(&self) -> Result<()> {
        let missing: Vec<String> = self
            .input
            .flags
            .values()
            .filter(|f| f.descriptor.required && !self.output.has_flag(f.name()))
            .map(|f| format!("Missing required flag {}", f.descriptor.usage()))
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        Err(self.error(ErrorKind::RequiredFlag, missing.join("\n")))
    }

    fn depends_on_failures(&self) -> IndexSet<String> {
        let mut reasons = IndexSet::new();
        for flag in self.present_flags() {
            let deps = &flag.descriptor.depends_on;
            if deps.is_empty() || deps.iter().all(|d| self.output.has_flag(d)) {
                continue;
            }
            reasons.insert(format!(
                "All of the following must be provided when using --{}: {}",
                flag.name(),
                dashed(deps)
            ));
        }
        reasons
    }

    fn exclusive_failures(&self) -> IndexSet<String> {
        let mut reasons = IndexSet::new();
        for flag in self.present_flags() {
            if self.output.metadata.flag_from_default(flag.name()) {
                continue;
            }
            if let Some(partner) = flag
                .descriptor
                .exclusive
                .iter()
                .find(|p| self.output.has_explicit_flag(p))
            {
                reasons.insert(self.conflict_reason(partner, flag.name()));
            }
        }
        reasons
    }

    fn exactly_one_failures(&self) -> IndexSet<String> {
        let mut reasons = IndexSet::new();
        for flag in self.input.flags.values() {
            let declared = &flag.descriptor.exactly_one;
            if declared.is_empty() {
                continue;
            }
            let mut members: IndexSet<&str> = IndexSet::new();
            members.insert(flag.name());
            members.extend(declared.iter().map(String::as_str));

            let supplied: Vec<&str> = members
                .iter()
                .copied()
                .filter(|m| self.output.has_explicit_flag(m))
                .collect();
            match supplied.as_slice() {
                [] => {
                    let mut sorted: Vec<&str> = members.iter().copied().collect();
                    sorted.sort_unstable();
                    reasons.insert(format!(
                        "Exactly one of the following must be provided: {}",
                        dashed(&sorted)
                    ));
                }
                [_] => {}
                [first, second, ..] => {
                    if supplied.contains(&flag.name()) {
                        let other = if *first == flag.name() { second } else { first };
                        reasons.insert(format!(
                            "--{other} cannot also be provided when using --{}",
                            flag.name()
                        ));
                    } else {
                        reasons.insert(format!(
                            "--{second} cannot also be provided when using --{first}"
                        ));
                    }
                }
            }
        }
        reasons
    }

    async fn relationship_failures(&self) -> IndexSet<String> {
        let mut reasons = IndexSet::new();
        let ctx = ParseContext {
            flags: self.output.flags.clone(),
            args: self.output.args.clone(),
            context: self.input.context.clone(),
        };
        for flag in self.present_flags() {
            for relationship in &flag.relationships {
                if let Some(reason) = self.check_relationship(flag, relationship, &ctx).await {
                    reasons.insert(reason);
                }
            }
        }
        reasons
    }

    async fn check_relationship(
        &self,
        owner: &Flag,
        relationship: &FlagRelationship,
        ctx: &ParseContext,
    ) -> Option<String> {
        let mut active: Vec<&str> = Vec::new();
        for related in &relationship.flags {
            let is_active = match &related.when {
                Some(when) => when(ctx.clone()).await,
                None => true,
            };
            if is_active {
                active.push(&related.name);
            }
        }

        let name = owner.name();
        match relationship.kind {
            RelationshipKind::All => {
                let missing: Vec<&str> = active
                    .iter()
                    .copied()
                    .filter(|f| !self.output.has_explicit_flag(f))
                    .collect();
                (!missing.is_empty()).then(|| {
                    format!(
                        "All of the following must be provided when using --{name}: {}",
                        dashed(&missing)
                    )
                })
            }
            RelationshipKind::Some => {
                let satisfied =
                    active.is_empty() || active.iter().any(|f| self.output.has_explicit_flag(f));
                (!satisfied).then(|| {
                    format!(
                        "One of the following must be provided when using --{name}: {}",
                        dashed(&active)
                    )
                })
            }
            RelationshipKind::None => {
                if self.output.metadata.flag_from_default(name) {
                    return None;
                }
                active
                    .iter()
                    .find(|f| self.output.has_explicit_flag(f))
                    .map(|f| self.conflict_reason(f, name))
            }
        }
    }

    fn present_flags(&self) -> impl Iterator<Item = &'a Flag> + '_ {
        self.input
            .flags
            .values()
            .filter(|f| self.output.has_flag(f.name()))
    }

    fn conflict_reason(&self, partner: &str, owner: &str) -> String {
        match self.output.flags.get(partner) {
            Some(Value::Bool(true)) | None => {
                format!("--{partner} cannot also be provided when using --{owner}")
            }
            Some(value) => format!(
                "--{partner}={} cannot also be provided when using --{owner}",
                display_value(value)
            ),
        }
    }
}

fn dashed<S: AsRef<str>>(names: &[S]) -> String {
    names
        .iter()
        .map(|n| format!("--{}", n.as_ref()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
