use clap::Parser;
use quality_loop::cli::commands::check::CheckCommands;
use quality_loop::cli::commands::learn::LearnCommands;
use quality_loop::cli::commands::review::ReviewCommands;
use quality_loop::cli::commands::score::ScoreCommands;
use quality_loop::cli::{Cli, Commands};

#[test]
fn test_parse_check_record_with_global_flags() {
    let cli = Cli::try_parse_from([
        "quality-loop",
        "--session",
        "chapter-7",
        "--json",
        "check",
        "record",
        "citation_format",
        "false_positive",
    ])
    .unwrap();

    assert_eq!(cli.session, "chapter-7");
    assert!(cli.json);
    match cli.command {
        Commands::Check(args) => match args.command {
            CheckCommands::Record { check_id, event } => {
                assert_eq!(check_id, "citation_format");
                assert_eq!(event, "false_positive");
            }
            _ => panic!("Wrong check command"),
        },
        _ => panic!("Wrong top-level command"),
    }
}

#[test]
fn test_global_flags_after_subcommand() {
    let cli = Cli::try_parse_from([
        "quality-loop",
        "score",
        "card",
        "--config",
        "custom.yaml",
        "-j",
    ])
    .unwrap();

    assert!(cli.json);
    assert_eq!(cli.config.unwrap().to_str(), Some("custom.yaml"));
    assert!(matches!(
        cli.command,
        Commands::Score(args) if matches!(args.command, ScoreCommands::Card)
    ));
}

#[test]
fn test_parse_score_set() {
    let cli = Cli::try_parse_from([
        "quality-loop",
        "score",
        "set",
        "clarity",
        "7.5",
        "--explanation",
        "mostly clear",
    ])
    .unwrap();

    match cli.command {
        Commands::Score(args) => match args.command {
            ScoreCommands::Set {
                dimension,
                score,
                explanation,
            } => {
                assert_eq!(dimension, "clarity");
                assert!((score - 7.5).abs() < f64::EPSILON);
                assert_eq!(explanation, "mostly clear");
            }
            _ => panic!("Wrong score command"),
        },
        _ => panic!("Wrong top-level command"),
    }
}

#[test]
fn test_parse_review_complete_scores() {
    let cli = Cli::try_parse_from([
        "quality-loop",
        "review",
        "complete",
        "--score",
        "clarity=7",
        "-s",
        "evidence=6.5",
        "--fingerprint",
        "abc123",
    ])
    .unwrap();

    match cli.command {
        Commands::Review(args) => match args.command {
            ReviewCommands::Complete {
                scores,
                fingerprint,
            } => {
                assert_eq!(
                    scores,
                    vec![("clarity".to_string(), 7.0), ("evidence".to_string(), 6.5)]
                );
                assert_eq!(fingerprint.as_deref(), Some("abc123"));
            }
            _ => panic!("Wrong review command"),
        },
        _ => panic!("Wrong top-level command"),
    }
}

#[test]
fn test_review_complete_requires_scores() {
    assert!(Cli::try_parse_from(["quality-loop", "review", "complete"]).is_err());
}

#[test]
fn test_malformed_score_rejected() {
    assert!(
        Cli::try_parse_from(["quality-loop", "review", "complete", "--score", "clarity"]).is_err()
    );
}

#[test]
fn test_parse_review_init_and_fix() {
    let cli = Cli::try_parse_from([
        "quality-loop",
        "review",
        "init",
        "--max-rounds",
        "3",
        "--window",
        "3",
        "--weight",
        "accuracy=2",
    ])
    .unwrap();
    match cli.command {
        Commands::Review(args) => match args.command {
            ReviewCommands::Init(init) => {
                assert_eq!(init.max_rounds, Some(3));
                assert_eq!(init.window, Some(3));
                assert_eq!(init.threshold, None);
                assert_eq!(init.weight, vec![("accuracy".to_string(), 2.0)]);
            }
            _ => panic!("Wrong review command"),
        },
        _ => panic!("Wrong top-level command"),
    }

    let cli = Cli::try_parse_from(["quality-loop", "review", "fix", "1", "0", "added source"])
        .unwrap();
    match cli.command {
        Commands::Review(args) => match args.command {
            ReviewCommands::Fix {
                round,
                index,
                description,
            } => {
                assert_eq!((round, index), (1, 0));
                assert_eq!(description, "added source");
            }
            _ => panic!("Wrong review command"),
        },
        _ => panic!("Wrong top-level command"),
    }
}

#[test]
fn test_parse_learn_trail_limit() {
    let cli = Cli::try_parse_from(["quality-loop", "learn", "trail", "--limit", "5"]).unwrap();
    match cli.command {
        Commands::Learn(args) => match args.command {
            LearnCommands::Trail { limit } => assert_eq!(limit, Some(5)),
            LearnCommands::Analyze => panic!("Wrong learn command"),
        },
        _ => panic!("Wrong top-level command"),
    }
}

#[test]
fn test_default_session() {
    temp_env::with_var_unset("QUALITY_LOOP_SESSION", || {
        let cli = Cli::try_parse_from(["quality-loop", "review", "status"]).unwrap();
        assert_eq!(cli.session, "default");
        assert!(!cli.json);
    });
}

#[test]
fn test_session_from_env() {
    temp_env::with_var("QUALITY_LOOP_SESSION", Some("from-env"), || {
        let cli = Cli::try_parse_from(["quality-loop", "review", "status"]).unwrap();
        assert_eq!(cli.session, "from-env");
    });
}
