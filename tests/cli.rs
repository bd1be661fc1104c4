//! Command-line surface

use clap::Parser;
use std::path::PathBuf;

use jmstool::config::{
    Cli, Command, SftpCommandConfig, TelnetCommandConfig, DEFAULT_SSH_PORT, DEFAULT_TELNET_PORT,
};

#[test]
fn test_ssh_defaults() {
    let cli = Cli::try_parse_from(["jmstool", "ssh", "root@127.0.0.1"]).unwrap();
    assert_eq!(cli.verbose, 0);

    let Command::Ssh(args) = cli.command else {
        panic!("expected ssh command");
    };
    assert_eq!(args.connect.target, "root@127.0.0.1");
    assert_eq!(args.connect.port, DEFAULT_SSH_PORT);
    assert!(args.connect.password.is_none());
    assert!(args.connect.identity.is_none());
    assert!(args.connect.config.is_none());
}

#[test]
fn test_ssh_port_and_password_flags_are_distinct() {
    let cli = Cli::try_parse_from([
        "jmstool",
        "ssh",
        "root@127.0.0.1",
        "-p",
        "2222",
        "-P",
        "1212",
        "-c",
        "algorithms.yaml",
        "--term",
        "vt100",
    ])
    .unwrap();

    let Command::Ssh(args) = cli.command else {
        panic!("expected ssh command");
    };
    assert_eq!(args.connect.port, 2222);
    assert_eq!(args.connect.password.as_deref(), Some("1212"));
    assert_eq!(args.connect.config, Some(PathBuf::from("algorithms.yaml")));
    assert_eq!(args.term, "vt100");
}

#[test]
fn test_verbose_is_global_and_counted() {
    let cli = Cli::try_parse_from(["jmstool", "-vv", "telnet", "root@host"]).unwrap();
    assert_eq!(cli.verbose, 2);

    let cli = Cli::try_parse_from(["jmstool", "telnet", "root@host", "-v"]).unwrap();
    assert_eq!(cli.verbose, 1);
}

#[test]
fn test_sftp_requires_download() {
    assert!(Cli::try_parse_from(["jmstool", "sftp", "root@127.0.0.1"]).is_err());
}

#[test]
fn test_sftp_output_defaults_to_remote_name() {
    let cli = Cli::try_parse_from([
        "jmstool",
        "sftp",
        "root@127.0.0.1",
        "-p",
        "2222",
        "-d",
        "/tmp/file.txt",
    ])
    .unwrap();

    let Command::Sftp(args) = cli.command else {
        panic!("expected sftp command");
    };
    let config = SftpCommandConfig::from_args(args).unwrap();
    assert_eq!(config.remote_path, "/tmp/file.txt");
    assert_eq!(config.local_path, PathBuf::from("file.txt"));
    assert_eq!(config.connect.port, 2222);
}

#[test]
fn test_telnet_flags() {
    let cli = Cli::try_parse_from([
        "jmstool",
        "telnet",
        "admin@10.0.0.1",
        "-P",
        "1212",
        "-c",
        r"\]\s*$",
    ])
    .unwrap();

    let Command::Telnet(args) = cli.command else {
        panic!("expected telnet command");
    };
    assert_eq!(args.port, DEFAULT_TELNET_PORT);

    let config = TelnetCommandConfig::from_args(args).unwrap();
    assert_eq!(config.target.username, "admin");
    assert_eq!(config.target.host, "10.0.0.1");
    assert_eq!(config.password, "1212");
    assert!(config.login_success.unwrap().is_match("[sw01]"));
}

#[test]
fn test_target_required() {
    assert!(Cli::try_parse_from(["jmstool", "ssh"]).is_err());
    assert!(Cli::try_parse_from(["jmstool", "telnet"]).is_err());
}

#[test]
fn test_unknown_command_rejected() {
    assert!(Cli::try_parse_from(["jmstool", "rdp", "root@host"]).is_err());
}

#[test]
fn test_bad_target_is_usage_error() {
    let cli = Cli::try_parse_from(["jmstool", "telnet", "10.0.0.1"]).unwrap();
    let Command::Telnet(args) = cli.command else {
        panic!("expected telnet command");
    };
    let err = TelnetCommandConfig::from_args(args).unwrap_err();
    assert_eq!(err.exit_code(), 2);
}
