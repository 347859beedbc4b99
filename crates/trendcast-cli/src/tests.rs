use super::*;

#[test]
fn no_command_is_none() {
    let cli = Cli::try_parse_from(["trendcast-cli"]).expect("expected valid cli args");
    assert!(cli.command.is_none());
}

#[test]
fn parses_detect_command() {
    let cli = Cli::try_parse_from(["trendcast-cli", "detect"]).expect("expected valid cli args");
    assert!(matches!(cli.command, Some(Commands::Detect)));
}

#[test]
fn predict_requires_a_title() {
    assert!(Cli::try_parse_from(["trendcast-cli", "predict"]).is_err());

    let cli = Cli::try_parse_from(["trendcast-cli", "predict", "--title", "Haaland scores"])
        .expect("expected valid cli args");
    assert!(matches!(
        cli.command,
        Some(Commands::Predict { ref title, ref description, .. })
            if title == "Haaland scores" && description.is_empty()
    ));
}

#[test]
fn generate_defaults_to_six_candidates() {
    let cli = Cli::try_parse_from(["trendcast-cli", "generate", "--trend-id", "7"])
        .expect("expected valid cli args");
    assert!(matches!(
        cli.command,
        Some(Commands::Generate {
            trend_id: 7,
            count: 6
        })
    ));
}

#[test]
fn parses_approve_with_positional_id() {
    let cli =
        Cli::try_parse_from(["trendcast-cli", "approve", "42"]).expect("expected valid cli args");
    assert!(matches!(cli.command, Some(Commands::Approve { id: 42 })));
}

#[test]
fn schedule_parses_platform_and_time() {
    let cli = Cli::try_parse_from([
        "trendcast-cli",
        "schedule",
        "3",
        "--platform",
        "twitter",
        "--at",
        "2030-05-01T18:00:00Z",
    ])
    .expect("expected valid cli args");

    let Some(Commands::Schedule { id, platform, at }) = cli.command else {
        panic!("expected schedule command");
    };
    assert_eq!(id, 3);
    assert_eq!(platform, Platform::Twitter);
    assert_eq!(
        at.map(|t| t.to_rfc3339()),
        Some("2030-05-01T18:00:00+00:00".to_string())
    );
}

#[test]
fn schedule_rejects_unknown_platform() {
    assert!(
        Cli::try_parse_from(["trendcast-cli", "schedule", "3", "--platform", "myspace"]).is_err()
    );
}

#[test]
fn schedule_post_time_is_optional() {
    let cli = Cli::try_parse_from(["trendcast-cli", "schedule-post", "12"])
        .expect("expected valid cli args");
    assert!(matches!(
        cli.command,
        Some(Commands::SchedulePost { id: 12, at: None })
    ));
}

#[test]
fn publish_accepts_repeated_platforms() {
    let cli = Cli::try_parse_from([
        "trendcast-cli",
        "publish",
        "9",
        "--platform",
        "facebook",
        "--platform",
        "twitter",
    ])
    .expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Publish { id: 9, ref platforms })
            if platforms == &[Platform::Facebook, Platform::Twitter]
    ));
}

#[test]
fn publish_without_platforms_uses_the_default() {
    let cli =
        Cli::try_parse_from(["trendcast-cli", "publish", "9"]).expect("expected valid cli args");
    assert!(matches!(
        cli.command,
        Some(Commands::Publish { ref platforms, .. }) if platforms.is_empty()
    ));
}

#[test]
fn parses_trigger_job_name() {
    let cli = Cli::try_parse_from(["trendcast-cli", "trigger", "auto_post_08:00"])
        .expect("expected valid cli args");
    assert!(matches!(
        cli.command,
        Some(Commands::Trigger { ref job }) if job == "auto_post_08:00"
    ));
}
