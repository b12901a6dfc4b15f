#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use mvz_updater::libs::config::Config;
    use mvz_updater::libs::data_storage::DataStorage;
    use mvz_updater::libs::state::{StatePersistence, UpdateState, STATE_FILE_NAME};
    use mvz_updater::libs::update::UpdateHooks;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;
    use test_context::{test_context, TestContext};

    /// Points the data directory at a throwaway location.
    struct ConfigTestContext {
        _temp_dir: TempDir,
        storage: DataStorage,
    }

    impl TestContext for ConfigTestContext {
        fn setup() -> Self {
            let temp_dir = tempfile::tempdir().unwrap();
            let storage = DataStorage::at(temp_dir.path().join("MVComplex").join("mvz"));
            ConfigTestContext {
                _temp_dir: temp_dir,
                storage,
            }
        }
    }

    #[test_context(ConfigTestContext)]
    #[test]
    fn test_default_config(_ctx: &mut ConfigTestContext) {
        let config = Config::default();
        assert_eq!(config.owner, "MVComplex");
        assert_eq!(config.repo, "MVZTEST");
        assert_eq!(config.exe_name, "MVZ.exe");
        assert_eq!(config.user_agent, "MVZ-Updater");
        assert_eq!(config.package_asset, "update.zip");
        assert_eq!(config.shared_runtime_dir, "_internal");
        assert_eq!(config.binary_dir, "bin");
        assert_eq!(config.check_interval_hours, 6);
        assert_eq!(config.current_version(), env!("CARGO_PKG_VERSION"));
    }

    #[test_context(ConfigTestContext)]
    #[test]
    fn test_read_nonexistent_config(ctx: &mut ConfigTestContext) {
        let config = Config::read_from(&ctx.storage).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test_context(ConfigTestContext)]
    #[test]
    fn test_save_and_read_config(ctx: &mut ConfigTestContext) {
        let config = Config {
            repo: "MVZ".to_string(),
            current_version: Some("1.3.9".to_string()),
            install_root: Some(PathBuf::from("/opt/mvz")),
            defer_shared_runtime: false,
            ..Config::default()
        };
        config.save_to(&ctx.storage).unwrap();

        let read_config = Config::read_from(&ctx.storage).unwrap();
        assert_eq!(read_config, config);
        assert_eq!(read_config.current_version(), "1.3.9");

        let settings = read_config.settings().unwrap();
        assert_eq!(settings.current_version, "1.3.9");
        assert_eq!(settings.install_root, PathBuf::from("/opt/mvz"));
        assert_eq!(settings.shared_runtime_dir, None);
        assert!(settings.work_dir.ends_with("mvz-updater"));
    }

    #[test_context(ConfigTestContext)]
    #[test]
    fn test_corrupted_config_is_an_error(ctx: &mut ConfigTestContext) {
        let path = ctx.storage.get_path("config.json").unwrap();
        fs::write(path, "{ not json").unwrap();
        assert!(Config::read_from(&ctx.storage).is_err());
    }

    #[test_context(ConfigTestContext)]
    #[test]
    fn test_state_persistence_hook(ctx: &mut ConfigTestContext) {
        let persistence = StatePersistence::new(ctx.storage.clone());
        persistence.persist_last_seen_tag("v1.4").unwrap();

        let state = UpdateState::read(&ctx.storage).unwrap();
        assert_eq!(state.last_seen_tag.as_deref(), Some("v1.4"));
        assert!(!state.is_check_due(Duration::hours(6), Utc::now()));
        assert!(state.is_check_due(Duration::hours(6), Utc::now() + Duration::hours(7)));
    }

    #[test_context(ConfigTestContext)]
    #[test]
    fn test_unreadable_state_starts_fresh(ctx: &mut ConfigTestContext) {
        fs::write(ctx.storage.get_path(STATE_FILE_NAME).unwrap(), "garbage").unwrap();

        let state = UpdateState::read(&ctx.storage).unwrap();
        assert_eq!(state, UpdateState::default());
        assert!(state.is_check_due(Duration::hours(6), Utc::now()));
    }

    /// The only test here touching process-wide environment.
    #[test_context(ConfigTestContext)]
    #[test]
    fn test_data_storage_follows_user_directory(ctx: &mut ConfigTestContext) {
        let home = ctx._temp_dir.path().to_path_buf();
        std::env::set_var("HOME", &home);
        std::env::set_var("LOCALAPPDATA", &home);

        let storage = DataStorage::new();
        assert!(storage.base_path().starts_with(&home));
        assert!(storage.base_path().ends_with(PathBuf::from("MVComplex").join("mvz")));

        Config::default().save().unwrap();
        assert!(storage.get_path("config.json").unwrap().is_file());
    }
}
