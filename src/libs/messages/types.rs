#[derive(Debug, Clone)]
pub enum Message {
    // === CONFIGURATION MESSAGES ===
    ConfigSaved,
    ConfigSectionRelease,
    ConfigSectionInstall,
    PromptOwner,
    PromptRepo,
    PromptCheckInterval,
    PromptInstallRoot,
    PromptExeName,
    PromptDeferRuntime(String), // shared runtime dir
    PromptBypassProcess,

    // === CHECK MESSAGES ===
    CheckingForUpdates(String), // source
    CheckNotDue {
        last_check: String,
        interval_hours: u64,
    },
    NoReleasePublished,
    UpToDate(String), // tag
    ReleaseAssetsMissing {
        tag: String,
        assets: Vec<String>,
    },
    UpdateAvailable {
        app_name: String,
        current: String,
        latest: String,
    },
    ChangelogHeader,

    // === UPDATE MESSAGES ===
    Progress(String, u8),
    BinaryStopped(String),
    BinaryStillRunning(String),
    NothingToUpdate(String), // tag
    UpdateApplied {
        version: String,
        files: usize,
    },
    RestartRequired(String), // executable name
    ChangedPathsHeader,
    UpdateCancelled,
    UpdateBusy,
    UpdateFailed(String),

    // === PLAN MESSAGES ===
    PlanHeader(String), // manifest version
    PlanNoChanges,
    PlanSummary {
        immediate: usize,
        deferred: usize,
        deletions: usize,
    },

    // === RELEASE MESSAGES ===
    ReleaseBuilt {
        package: String,
        manifest: String,
    },
    ReleaseSummary {
        packed: usize,
        deleted: usize,
        delta: bool,
    },

    // === ERROR MESSAGES ===
    ManifestFileNotFound(String),
    InputDirNotFound(String),
    FileHashFailed(String, String), // path, error
}
