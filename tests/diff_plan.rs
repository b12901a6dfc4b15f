#[cfg(test)]
mod tests {
    use mvz_updater::libs::apply::{ApplyPlan, DeferralRules};
    use mvz_updater::libs::diff::ChangeSet;
    use mvz_updater::libs::error::ErrorKind;
    use mvz_updater::libs::extract::extract_needed;
    use mvz_updater::libs::hasher::sha256_bytes;
    use mvz_updater::libs::manifest::Manifest;
    use mvz_updater::libs::paths::RelPath;
    use std::fs::{self, File};
    use std::io::Write;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;
    use test_context::{test_context, TestContext};
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    struct InstallContext {
        _temp_dir: TempDir,
        root: PathBuf,
        stage: PathBuf,
    }

    impl TestContext for InstallContext {
        fn setup() -> Self {
            let temp_dir = tempfile::tempdir().unwrap();
            let root = temp_dir.path().join("MVZ");
            let stage = temp_dir.path().join("stage");
            fs::create_dir_all(&root).unwrap();
            InstallContext {
                _temp_dir: temp_dir,
                root,
                stage,
            }
        }
    }

    impl InstallContext {
        fn write(&self, rel: &str, content: &str) {
            let path = self.root.join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }

        fn package(&self, entries: &[(&str, &str)]) -> PathBuf {
            let path = self._temp_dir.path().join("update.zip");
            let mut zip = ZipWriter::new(File::create(&path).unwrap());
            for (name, content) in entries {
                zip.start_file(*name, SimpleFileOptions::default()).unwrap();
                zip.write_all(content.as_bytes()).unwrap();
            }
            zip.finish().unwrap();
            path
        }
    }

    fn manifest(files: &[(&str, &str)], delete: &[&str]) -> Manifest {
        let files: Vec<String> = files
            .iter()
            .map(|(path, content)| format!(r#"{{"path":"{}","sha256":"{}"}}"#, path, sha256_bytes(content.as_bytes())))
            .collect();
        let delete: Vec<String> = delete.iter().map(|p| format!(r#""{}""#, p)).collect();
        Manifest::from_json(&format!(
            r#"{{"version":"v1.5","files":[{}],"delete":[{}]}}"#,
            files.join(","),
            delete.join(",")
        ))
        .unwrap()
    }

    fn strs(paths: &[RelPath]) -> Vec<&str> {
        paths.iter().map(RelPath::as_str).collect()
    }

    #[test_context(InstallContext)]
    #[test]
    fn diff_reports_missing_and_stale_files_only(ctx: &mut InstallContext) {
        ctx.write("MVZ.exe", "exe v1");
        ctx.write("lists/hosts.txt", "hosts");
        ctx.write("old/readme.txt", "obsolete");

        let manifest = manifest(
            &[("MVZ.exe", "exe v2"), ("lists/hosts.txt", "hosts"), ("lists/new.txt", "new")],
            &["old/readme.txt", "never/existed.txt"],
        );
        let changes = ChangeSet::compute(&manifest, &ctx.root);

        assert_eq!(strs(&changes.changed), vec!["MVZ.exe", "lists/new.txt"]);
        assert_eq!(strs(&changes.deletions), vec!["old/readme.txt"]);
        assert!(changes.touches_dir("lists"));
        assert!(!changes.touches_dir("bin"));
    }

    #[test_context(InstallContext)]
    #[test]
    fn matching_install_has_nothing_to_do(ctx: &mut InstallContext) {
        ctx.write("lists/hosts.txt", "hosts");

        let changes = ChangeSet::compute(&manifest(&[("lists/hosts.txt", "hosts")], &[]), &ctx.root);
        assert!(changes.is_empty());
    }

    #[test_context(InstallContext)]
    #[test]
    fn plan_defers_locked_paths(ctx: &mut InstallContext) {
        let manifest = manifest(
            &[("MVZ.exe", "exe"), ("_internal/python.dll", "rt"), ("bin/winws.exe", "bypass")],
            &[],
        );
        let changes = ChangeSet::compute(&manifest, &ctx.root);

        let plan = ApplyPlan::classify(&changes, &DeferralRules::new("mvz.exe", Some("_internal")));
        assert_eq!(strs(&plan.immediate), vec!["bin/winws.exe"]);
        assert_eq!(strs(&plan.deferred), vec!["MVZ.exe", "_internal/python.dll"]);
        assert!(plan.needs_handoff());

        let plan = ApplyPlan::classify(&changes, &DeferralRules::new("MVZ.exe", None));
        assert_eq!(strs(&plan.immediate), vec!["_internal/python.dll", "bin/winws.exe"]);
        assert_eq!(strs(&plan.deferred), vec!["MVZ.exe"]);
    }

    #[test_context(InstallContext)]
    #[test]
    fn extraction_stages_only_requested_entries(ctx: &mut InstallContext) {
        let package = ctx.package(&[("MVZ.exe", "exe"), ("lists/hosts.txt", "hosts"), ("lists/other.txt", "other")]);
        let needed = vec![RelPath::parse("lists/hosts.txt").unwrap()];

        extract_needed(&package, &needed, &ctx.stage).unwrap();

        assert_eq!(fs::read_to_string(ctx.stage.join("lists/hosts.txt")).unwrap(), "hosts");
        assert!(!ctx.stage.join("MVZ.exe").exists());
        assert!(!ctx.stage.join("lists/other.txt").exists());
        assert!(!Path::new(&ctx.root).join("lists/hosts.txt").exists());
    }

    #[test_context(InstallContext)]
    #[test]
    fn extraction_rejects_unsafe_entries(ctx: &mut InstallContext) {
        let package = ctx.package(&[("../escape.txt", "x"), ("lists/hosts.txt", "hosts")]);
        let needed = vec![RelPath::parse("lists/hosts.txt").unwrap()];

        let err = extract_needed(&package, &needed, &ctx.stage).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PathSafety);
        assert!(!ctx._temp_dir.path().join("escape.txt").exists());
    }

    #[test_context(InstallContext)]
    #[test]
    fn extraction_fails_when_package_lacks_entry(ctx: &mut InstallContext) {
        let package = ctx.package(&[("lists/hosts.txt", "hosts")]);
        let needed = vec![RelPath::parse("lists/missing.txt").unwrap()];

        let err = extract_needed(&package, &needed, &ctx.stage).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Integrity);
    }
}
