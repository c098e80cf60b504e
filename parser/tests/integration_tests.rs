use std::collections::HashMap;

use command_runtime_core::{
    ArgDescriptor, CliError, ErrorKind, ExitCodes, FlagDescriptor, RelationshipKind,
};
use command_runtime_parser::{
    Arg, Flag, FnError, InputSchema, ParseContext, ParseOutput, Parser, Related, StaticStdin,
    Validator,
};
use serde_json::json;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn parse(input: &InputSchema, argv: &[&str]) -> Result<ParseOutput, CliError> {
    Parser::new(input).without_stdin().parse(argv).await
}

/// Parses and validates, returning the validation error.
async fn rejected(input: &InputSchema, argv: &[&str]) -> CliError {
    let out = parse(input, argv).await.unwrap();
    Validator::new(input, &out).run().await.unwrap_err()
}

async fn accepted(input: &InputSchema, argv: &[&str]) -> ParseOutput {
    let out = parse(input, argv).await.unwrap();
    Validator::new(input, &out).run().await.unwrap();
    out
}

fn integer(flag: FlagDescriptor) -> Flag {
    Flag::new(flag).parse_with(|v, _| async move {
        let n: i64 = v.parse()?;
        Ok::<_, FnError>(json!(n))
    })
}

// ---------------------------------------------------------------------------
// Booleans
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_boolean_flag_sets_true() {
    let input = InputSchema::new().flag(FlagDescriptor::boolean("flag"));
    let out = accepted(&input, &["--flag"]).await;
    assert_eq!(out.flags["flag"], json!(true));
}

#[tokio::test]
async fn test_allow_no_negates() {
    let input = InputSchema::new().flag(FlagDescriptor::boolean("flag").allow_no());
    let out = accepted(&input, &["--no-flag"]).await;
    assert_eq!(out.flags["flag"], json!(false));
}

#[tokio::test]
async fn test_negation_without_allow_no_is_nonexistent() {
    let input = InputSchema::new().flag(FlagDescriptor::boolean("flag"));
    let err = rejected(&input, &["--no-flag"]).await;
    assert_eq!(err.kind, ErrorKind::NonExistentFlag);
    assert!(err.message.starts_with("Nonexistent flag: --no-flag"));
}

#[tokio::test]
async fn test_last_polarity_wins() {
    let input = InputSchema::new().flag(FlagDescriptor::boolean("color").allow_no());
    let out = accepted(&input, &["--no-color", "--color"]).await;
    assert_eq!(out.flags["color"], json!(true));
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_computed_default_goes_through_parse() {
    let input = InputSchema::new().flag(
        integer(FlagDescriptor::option("count"))
            .default_with(|_| async { Ok::<_, FnError>(Some(json!("5"))) }),
    );
    let out = accepted(&input, &[]).await;
    assert_eq!(out.flags["count"], json!(5));
    assert!(out.metadata.flag_from_default("count"));
}

#[tokio::test]
async fn test_static_default_goes_through_parse() {
    let input = InputSchema::new()
        .flag(integer(FlagDescriptor::option("retries").with_default("3")));
    let out = accepted(&input, &[]).await;
    assert_eq!(out.flags["retries"], json!(3));
}

#[tokio::test]
async fn test_default_sees_earlier_flags() {
    let input = InputSchema::new()
        .flag(FlagDescriptor::option("name"))
        .flag(Flag::new(FlagDescriptor::option("greeting")).default_with(
            |ctx: ParseContext| async move {
                let name = ctx.flag("name").and_then(|v| v.as_str()).unwrap_or("nobody");
                Ok::<_, FnError>(Some(json!(format!("hello {name}"))))
            },
        ));
    let out = accepted(&input, &["--name", "ada"]).await;
    assert_eq!(out.flags["greeting"], json!("hello ada"));
}

#[tokio::test]
async fn test_default_options_are_not_checked() {
    let input = InputSchema::new().flag(
        FlagDescriptor::option("level")
            .with_options(["debug", "info"])
            .with_default("trace"),
    );
    let out = accepted(&input, &[]).await;
    assert_eq!(out.flags["level"], json!("trace"));
}

#[tokio::test]
async fn test_arg_default_is_recorded() {
    let input = InputSchema::new().arg(ArgDescriptor::optional("target").with_default("."));
    let out = accepted(&input, &[]).await;
    assert_eq!(out.args["target"], json!("."));
    assert!(out.metadata.arg_from_default("target"));
    assert!(out.argv.is_empty());
}

// ---------------------------------------------------------------------------
// Options, multiples and parse functions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_invalid_option_names_allowed_set() {
    let input =
        InputSchema::new().flag(FlagDescriptor::option("level").with_options(["debug", "info"]));
    let err = parse(&input, &["--level", "trace"]).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::FlagInvalidOption);
    assert_eq!(err.message, "Expected --level=trace to be one of: debug, info");
    assert_eq!(err.code, "FLAG_INVALID_OPTION");
}

#[tokio::test]
async fn test_invalid_arg_option() {
    let input = InputSchema::new().arg(ArgDescriptor::required("env").with_options(["dev", "prod"]));
    let err = parse(&input, &["qa"]).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::ArgInvalidOption);
    assert_eq!(err.message, "Expected qa to be one of: dev, prod");
}

#[tokio::test]
async fn test_multiple_values_keep_input_order() {
    let input = InputSchema::new()
        .flag(FlagDescriptor::option("tag").allow_multiple().with_delimiter(','))
        .arg(ArgDescriptor::optional("file"));
    let out = accepted(&input, &["--tag", "a,b", "--tag=c", "--", "main.rs"]).await;
    assert_eq!(out.flags["tag"], json!(["a", "b", "c"]));
    assert_eq!(out.args["file"], json!("main.rs"));
}

#[tokio::test]
async fn test_multiple_window_swallows_bare_tokens() {
    let input = InputSchema::new()
        .flag(FlagDescriptor::option("tag").allow_multiple())
        .arg(ArgDescriptor::optional("file"));
    let out = accepted(&input, &["--tag", "a", "b"]).await;
    assert_eq!(out.flags["tag"], json!(["a", "b"]));
    assert!(!out.has_arg("file"));
}

#[tokio::test]
async fn test_failed_parse_reports_input() {
    let input = InputSchema::new().arg(Arg::new(ArgDescriptor::required("port")).parse_with(
        |v, _| async move {
            let port: u16 = v.parse()?;
            Ok::<_, FnError>(json!(port))
        },
    ));
    let err = parse(&input, &["abc"]).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::FailedParse);
    assert!(err.message.starts_with("Parsing port\n\tabc\n\t"));
}

#[tokio::test]
async fn test_short_cluster_and_alias() {
    let input = InputSchema::new()
        .flag(FlagDescriptor::boolean("all").with_char('a'))
        .flag(FlagDescriptor::boolean("verbose").with_char('v'))
        .flag(FlagDescriptor::option("output").with_char('o').with_alias("out"));
    let out = accepted(&input, &["-av", "--out", "x.txt"]).await;
    assert_eq!(out.flags["all"], json!(true));
    assert_eq!(out.flags["verbose"], json!(true));
    assert_eq!(out.flags["output"], json!("x.txt"));
}

// ---------------------------------------------------------------------------
// Environment and stdin
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_env_fallback() {
    let input = InputSchema::new()
        .flag(integer(FlagDescriptor::option("port").with_env("APP_PORT")))
        .flag(FlagDescriptor::boolean("debug").with_env("APP_DEBUG"))
        .flag(FlagDescriptor::option("region").with_env("APP_REGION").with_default("eu"));
    let env: HashMap<String, String> = [
        ("APP_PORT".to_string(), "8080".to_string()),
        ("APP_DEBUG".to_string(), "Yes".to_string()),
    ]
    .into();

    let out = Parser::new(&input)
        .env(env)
        .without_stdin()
        .parse::<&str>(&[])
        .await
        .unwrap();
    assert_eq!(out.flags["port"], json!(8080));
    assert_eq!(out.flags["debug"], json!(true));
    assert_eq!(out.flags["region"], json!("eu"));
    assert!(!out.metadata.flag_from_default("port"));
    assert!(out.metadata.flag_from_default("region"));
}

#[tokio::test]
async fn test_explicit_input_beats_env() {
    let input = InputSchema::new().flag(FlagDescriptor::option("region").with_env("APP_REGION"));
    let env: HashMap<String, String> = [("APP_REGION".to_string(), "us".to_string())].into();
    let out = Parser::new(&input)
        .env(env)
        .without_stdin()
        .parse(&["--region", "eu"])
        .await
        .unwrap();
    assert_eq!(out.flags["region"], json!("eu"));
}

#[tokio::test]
async fn test_stdin_fills_first_gap_only() {
    let input = InputSchema::new()
        .arg(ArgDescriptor::required("first"))
        .arg(ArgDescriptor::required("second"));
    let out = Parser::new(&input)
        .stdin(StaticStdin("from pipe\n".into()))
        .parse::<&str>(&[])
        .await
        .unwrap();
    assert_eq!(out.args["first"], json!("from pipe"));
    assert!(!out.has_arg("second"));

    let err = Validator::new(&input, &out).run().await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::RequiredArgs);
    assert!(err.message.starts_with("Missing 1 required arg:\nsecond"));
}

#[tokio::test]
async fn test_ignore_stdin_skips_arg() {
    let input = InputSchema::new()
        .arg(ArgDescriptor::required("first").ignore_stdin())
        .arg(ArgDescriptor::optional("second"));
    let out = Parser::new(&input)
        .stdin(StaticStdin("piped".into()))
        .parse::<&str>(&[])
        .await
        .unwrap();
    assert!(!out.has_arg("first"));
    assert_eq!(out.args["second"], json!("piped"));
}

// ---------------------------------------------------------------------------
// Positional validation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_strict_overflow_names_extras() {
    let input = InputSchema::new().arg(ArgDescriptor::required("first"));
    let err = rejected(&input, &["a", "b", "c"]).await;
    assert_eq!(err.kind, ErrorKind::UnexpectedArgs);
    assert!(err.message.starts_with("Unexpected arguments: b, c"));
}

#[tokio::test]
async fn test_non_strict_keeps_extras_and_unknown_flags() {
    let input = InputSchema::new()
        .arg(ArgDescriptor::required("first"))
        .strict(false);
    let out = accepted(&input, &["a", "--unknown", "b"]).await;
    assert_eq!(out.args["first"], json!("a"));
    assert_eq!(out.argv, vec![json!("a"), json!("--unknown"), json!("b")]);
}

#[tokio::test]
async fn test_unknown_flag_reported_before_overflow() {
    let input = InputSchema::new();
    let err = rejected(&input, &["--nope", "a"]).await;
    assert_eq!(err.kind, ErrorKind::NonExistentFlag);
}

#[tokio::test]
async fn test_required_after_optional_is_invalid_spec() {
    let input = InputSchema::new()
        .arg(ArgDescriptor::optional("a"))
        .arg(ArgDescriptor::required("b"));
    let err = rejected(&input, &[]).await;
    assert_eq!(err.kind, ErrorKind::InvalidArgsSpec);
}

#[tokio::test]
async fn test_missing_args_mention_multiple_flags() {
    let input = InputSchema::new()
        .flag(FlagDescriptor::option("tag").allow_multiple())
        .arg(ArgDescriptor::required("file"));
    let err = rejected(&input, &["--tag", "x", "y"]).await;
    assert_eq!(err.kind, ErrorKind::RequiredArgs);
    assert!(err.message.contains("--tag allows multiple values"));
}

// ---------------------------------------------------------------------------
// Exit codes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_exit_code_override() {
    let input = InputSchema::new().arg(ArgDescriptor::required("file"));
    let out = parse(&input, &[]).await.unwrap();

    let codes: ExitCodes = serde_json::from_str(r#"{"requiredArgs": 105}"#).unwrap();
    let err = Validator::new(&input, &out)
        .exit_codes(&codes)
        .run()
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::RequiredArgs);
    assert_eq!(err.exit, 105);

    let err = Validator::new(&input, &out).run().await.unwrap_err();
    assert_eq!(err.exit, 2);
}

#[tokio::test]
async fn test_parser_exit_code_override() {
    let input = InputSchema::new().flag(FlagDescriptor::option("name"));
    let codes = ExitCodes::new().with(ErrorKind::FlagValueMissing, 64);
    let err = Parser::new(&input)
        .exit_codes(&codes)
        .without_stdin()
        .parse(&["--name"])
        .await
        .unwrap_err();
    assert_eq!(err.exit, 64);
}

// ---------------------------------------------------------------------------
// Flag relationships
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_required_flag_uses_usage() {
    let input = InputSchema::new().flag(FlagDescriptor::option("region").with_char('r').required());
    let err = rejected(&input, &[]).await;
    assert_eq!(err.kind, ErrorKind::RequiredFlag);
    assert_eq!(err.message, "Missing required flag -r, --region=<value>");
}

#[tokio::test]
async fn test_depends_on() {
    let input = InputSchema::new()
        .flag(FlagDescriptor::option("user").depends_on(["password"]))
        .flag(FlagDescriptor::option("password"));
    let err = rejected(&input, &["--user", "bob"]).await;
    assert_eq!(err.kind, ErrorKind::FailedFlagValidation);
    assert_eq!(
        err.message,
        "All of the following must be provided when using --user: --password"
    );
    accepted(&input, &["--user", "bob", "--password", "pw"]).await;
}

#[tokio::test]
async fn test_exclusive_exempts_defaults() {
    let input = InputSchema::new()
        .flag(FlagDescriptor::option("a").exclusive_with(["b"]))
        .flag(FlagDescriptor::option("b").with_default("x"));
    let out = accepted(&input, &["--a=1"]).await;
    assert_eq!(out.flags["b"], json!("x"));

    let err = rejected(&input, &["--a=1", "--b=y"]).await;
    assert_eq!(err.kind, ErrorKind::FailedFlagValidation);
    assert_eq!(err.message, "--b=y cannot also be provided when using --a");
}

#[tokio::test]
async fn test_exactly_one() {
    let input = InputSchema::new()
        .flag(FlagDescriptor::boolean("json").exactly_one(["yaml"]))
        .flag(FlagDescriptor::boolean("yaml").exactly_one(["json"]));

    let err = rejected(&input, &[]).await;
    assert_eq!(
        err.message,
        "Exactly one of the following must be provided: --json, --yaml"
    );

    let err = rejected(&input, &["--json", "--yaml"]).await;
    assert!(err.message.contains("--yaml cannot also be provided when using --json"));

    accepted(&input, &["--yaml"]).await;
}

#[tokio::test]
async fn test_relationship_all_names_missing() {
    let input = InputSchema::new()
        .flag(Flag::new(FlagDescriptor::boolean("deploy")).relationship(RelationshipKind::All, [
            "region", "env",
        ]))
        .flag(FlagDescriptor::option("region"))
        .flag(FlagDescriptor::option("env"));
    let err = rejected(&input, &["--deploy", "--region", "eu"]).await;
    assert_eq!(
        err.message,
        "All of the following must be provided when using --deploy: --env"
    );
}

#[tokio::test]
async fn test_relationship_some() {
    let input = InputSchema::new()
        .flag(Flag::new(FlagDescriptor::boolean("notify")).relationship(
            RelationshipKind::Some,
            ["email", "slack"],
        ))
        .flag(FlagDescriptor::option("email"))
        .flag(FlagDescriptor::option("slack"));
    let err = rejected(&input, &["--notify"]).await;
    assert_eq!(
        err.message,
        "One of the following must be provided when using --notify: --email, --slack"
    );
    accepted(&input, &["--notify", "--slack", "#ops"]).await;
}

#[tokio::test]
async fn test_relationship_none_with_predicate() {
    let input = InputSchema::new()
        .flag(Flag::new(FlagDescriptor::option("dessert")).relationship(
            RelationshipKind::None,
            [Related::when("sprinkles", |ctx: ParseContext| async move {
                ctx.is_set("birthday")
            })],
        ))
        .flag(FlagDescriptor::boolean("birthday"))
        .flag(FlagDescriptor::boolean("sprinkles"));

    let err = rejected(&input, &["--dessert=cake", "--birthday", "--sprinkles"]).await;
    assert_eq!(err.kind, ErrorKind::FailedFlagValidation);
    assert_eq!(
        err.message,
        "--sprinkles cannot also be provided when using --dessert"
    );

    accepted(&input, &["--dessert=cake", "--sprinkles"]).await;
}

#[tokio::test]
async fn test_relationship_messages_concatenate() {
    let input = InputSchema::new()
        .flag(
            Flag::new(FlagDescriptor::boolean("owner"))
                .relationship(RelationshipKind::All, ["a"])
                .relationship(RelationshipKind::None, ["b"]),
        )
        .flag(FlagDescriptor::boolean("a"))
        .flag(FlagDescriptor::boolean("b"));
    let err = rejected(&input, &["--owner", "--b"]).await;
    assert_eq!(
        err.message,
        "All of the following must be provided when using --owner: --a\n\
         --b cannot also be provided when using --owner"
    );
}
