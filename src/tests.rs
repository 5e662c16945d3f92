#[cfg(test)]
mod tests {
    use crate::error::TapeLibraryError;
    use crate::library::{ReadWriteError, ReadWriteErrorCode};

    #[test]
    fn test_error_creation() {
        let catalog_error = TapeLibraryError::catalog("store down");
        assert!(matches!(catalog_error, TapeLibraryError::Catalog(_)));
        assert_eq!(catalog_error.to_string(), "Catalog access error: store down");

        let validation_error = TapeLibraryError::parameter_validation("file name is required");
        assert!(matches!(validation_error, TapeLibraryError::ParameterValidation(_)));
    }

    #[test]
    fn test_read_write_error_display() {
        let err = ReadWriteError::new(ReadWriteErrorCode::KoOnLoadTape, "robot jammed");
        assert_eq!(err.to_string(), "KoOnLoadTape: robot jammed");
    }
}

#[cfg(test)]
mod integration_tests {
    use crate::commands::simulate;
    use crate::config::LibraryConfig;
    use crate::model::{QueueState, ReadOrder, StatusCode, TapeState, WriteOrder};
    use crate::worker::TapeOrder;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_cli_parsing() {
        use crate::cli::{Cli, Commands};
        use clap::Parser;

        let args = vec!["tapeoffer", "catalog"];
        let cli = Cli::try_parse_from(args);
        assert!(cli.is_ok());

        if let Ok(cli) = cli {
            assert!(matches!(cli.command, Commands::Catalog));
            assert!(!cli.verbose);
        }
    }

    #[test]
    fn test_simulate_command_parsing() {
        use crate::cli::{Cli, Commands};
        use clap::Parser;

        let args = vec![
            "tapeoffer",
            "--verbose",
            "--json-logs",
            "--config",
            "lib.json",
            "simulate",
            "--orders",
            "orders.json",
        ];

        let cli = Cli::try_parse_from(args).unwrap();
        assert!(cli.verbose);
        assert!(cli.json_logs);
        assert_eq!(cli.config, Some(PathBuf::from("lib.json")));
        match cli.command {
            Commands::Simulate { orders, json } => {
                assert_eq!(orders, PathBuf::from("orders.json"));
                assert!(!json);
            }
            other => panic!("unexpected command {:?}", other),
        }

        assert!(Cli::try_parse_from(vec!["tapeoffer", "simulate"]).is_err());
    }

    fn config(dir: &TempDir, drives: u32) -> LibraryConfig {
        LibraryConfig {
            library: "SIM".to_string(),
            drives,
            slots: 6,
            cartridges: 4,
            input_directory: dir.path().join("in"),
            output_directory: dir.path().join("out"),
            ..LibraryConfig::default()
        }
    }

    fn stage(config: &LibraryConfig, name: &str, content: &[u8]) -> WriteOrder {
        fs::create_dir_all(&config.input_directory).unwrap();
        fs::write(config.input_directory.join(name), content).unwrap();
        WriteOrder::new("bucket-a", name, content.len() as u64)
    }

    #[tokio::test]
    async fn test_written_file_reads_back() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir, 1);
        let orders = vec![
            TapeOrder::Write(stage(&config, "a.tar", b"first archive")),
            TapeOrder::Write(stage(&config, "b.tar", b"second archive")),
            // file 0 is the label
            TapeOrder::Read(ReadOrder::new("TAPE-1", 1, "a-restored.tar")),
            TapeOrder::Read(ReadOrder::new("UNKNOWN", 0, "nothing.tar")),
        ];

        let report = simulate::run(&config, orders).await.unwrap();

        let finals = report.final_outcomes();
        assert_eq!(finals.len(), 4);
        for outcome in &finals[..3] {
            assert_eq!(outcome.result.status, StatusCode::Ok, "{:?}", outcome);
        }
        assert_eq!(
            (finals[3].result.status, finals[3].result.order_state),
            (StatusCode::Fatal, QueueState::Error)
        );
        assert_eq!(
            fs::read(config.output_directory.join("a-restored.tar")).unwrap(),
            b"first archive"
        );
        assert!(!config.input_directory.join("a.tar").exists());

        let tape = report.catalog.iter().find(|t| t.code == "TAPE-1").unwrap();
        assert_eq!(tape.state, TapeState::Open);
        assert_eq!(tape.file_count, 3);
        assert_eq!(tape.bucket.as_deref(), Some("bucket-a"));
        assert!(report.failures.is_empty(), "{:?}", report.failures);
    }

    #[tokio::test]
    async fn test_drives_share_catalog_without_conflict() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir, 2);
        let orders = (0..6)
            .map(|i| {
                let mut order = stage(&config, &format!("f{}.tar", i), b"payload");
                order.bucket = format!("bucket-{}", i % 2);
                TapeOrder::Write(order)
            })
            .collect();

        let report = simulate::run(&config, orders).await.unwrap();

        let finals = report.final_outcomes();
        assert_eq!(finals.len(), 6);
        assert!(finals.iter().all(|o| o.result.status == StatusCode::Ok));
        assert!(report.failures.is_empty(), "{:?}", report.failures);

        // every file landed once, one bucket per cartridge
        let data_files: u32 = report
            .catalog
            .iter()
            .filter(|t| t.file_count > 0)
            .map(|t| t.file_count - 1)
            .sum();
        assert_eq!(data_files, 6);
        for bucket in ["bucket-0", "bucket-1"] {
            assert!(report
                .catalog
                .iter()
                .any(|t| t.bucket.as_deref() == Some(bucket)));
        }
    }

    #[tokio::test]
    async fn test_simulate_command_reads_orders_file() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir, 1);
        stage(&config, "a.tar", b"abc");
        let orders = dir.path().join("orders.json");
        fs::write(
            &orders,
            r#"[{"type": "write", "bucket": "bucket-a", "file_path": "a.tar", "size": 3}]"#,
        )
        .unwrap();

        assert!(simulate::execute(config.clone(), orders, false).await.is_ok());
        assert!(!config.input_directory.join("a.tar").exists());
    }
}
