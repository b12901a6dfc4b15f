#[cfg(test)]
mod tests {
    use mvz_updater::libs::hasher::sha256_bytes;
    use mvz_updater::libs::manifest::Manifest;
    use mvz_updater::libs::release::{ReleaseBuilder, ReleaseOptions};
    use std::fs::{self, File};
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;
    use test_context::{test_context, TestContext};
    use zip::ZipArchive;

    struct ReleaseContext {
        _temp_dir: TempDir,
        input: PathBuf,
        out: PathBuf,
    }

    impl TestContext for ReleaseContext {
        fn setup() -> Self {
            let temp_dir = tempfile::tempdir().unwrap();
            let input = temp_dir.path().join("dist").join("MVZ");
            let out = temp_dir.path().join("release_out");
            for (rel, content) in [
                ("MVZ.exe", "exe"),
                ("lists/hosts.txt", "hosts"),
                ("bin/winws.exe", "bypass"),
                ("_internal/python.dll", "runtime"),
                ("lists/__pycache__/x.pyc", "cache"),
                ("session.log", "log"),
                ("lists/partial.tmp", "tmp"),
                ("manifest.json", "{}"),
            ] {
                let path = input.join(rel);
                fs::create_dir_all(path.parent().unwrap()).unwrap();
                fs::write(path, content).unwrap();
            }
            ReleaseContext {
                _temp_dir: temp_dir,
                input,
                out,
            }
        }
    }

    fn archive_names(path: &Path) -> Vec<String> {
        let archive = ZipArchive::new(File::open(path).unwrap()).unwrap();
        let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
        names.sort();
        names
    }

    fn listed(manifest: &Manifest) -> Vec<&str> {
        manifest.files.iter().map(|f| f.path.as_str()).collect()
    }

    #[test_context(ReleaseContext)]
    #[test]
    fn full_release_skips_build_noise_and_runtime(ctx: &mut ReleaseContext) {
        let artifacts = ReleaseBuilder::new(&ctx.input, ReleaseOptions::new("v1.4")).build(&ctx.out).unwrap();

        let manifest = Manifest::load(&artifacts.manifest).unwrap();
        assert_eq!(manifest.version, "v1.4");
        assert_eq!(manifest.package.as_deref(), Some("update.zip"));
        assert!(!manifest.delta);
        assert!(!manifest.include_internal);
        assert!(manifest.created_utc.is_some());
        assert!(manifest.delete.is_empty());
        assert_eq!(listed(&manifest), vec!["MVZ.exe", "bin/winws.exe", "lists/hosts.txt"]);

        let hosts = manifest.files.iter().find(|f| f.path.as_str() == "lists/hosts.txt").unwrap();
        assert_eq!(hosts.sha256, sha256_bytes(b"hosts"));
        assert_eq!(hosts.size, Some(5));

        assert_eq!(archive_names(&artifacts.package), vec!["MVZ.exe", "bin/winws.exe", "lists/hosts.txt"]);
        assert_eq!(artifacts.packed, 3);
    }

    #[test_context(ReleaseContext)]
    #[test]
    fn include_internal_ships_runtime(ctx: &mut ReleaseContext) {
        let options = ReleaseOptions {
            include_internal: true,
            ..ReleaseOptions::new("v1.4")
        };
        let artifacts = ReleaseBuilder::new(&ctx.input, options).build(&ctx.out).unwrap();

        let manifest = Manifest::load(&artifacts.manifest).unwrap();
        assert!(manifest.include_internal);
        assert!(listed(&manifest).contains(&"_internal/python.dll"));
    }

    #[test_context(ReleaseContext)]
    #[test]
    fn delta_release_packs_changes_and_lists_removals(ctx: &mut ReleaseContext) {
        let first = ReleaseBuilder::new(&ctx.input, ReleaseOptions::new("v1.4")).build(&ctx.out).unwrap();
        let previous = Manifest::load(&first.manifest).unwrap();

        fs::write(ctx.input.join("lists/hosts.txt"), "hosts v2").unwrap();
        fs::remove_file(ctx.input.join("bin/winws.exe")).unwrap();
        fs::write(ctx.input.join("lists/new.txt"), "new").unwrap();

        let delta_out = ctx.out.join("delta");
        let options = ReleaseOptions {
            previous: Some(previous),
            zip_name: "delta.zip".to_string(),
            ..ReleaseOptions::new("v1.5")
        };
        let artifacts = ReleaseBuilder::new(&ctx.input, options).build(&delta_out).unwrap();

        let manifest = Manifest::load(&artifacts.manifest).unwrap();
        assert!(manifest.delta);
        assert_eq!(manifest.package.as_deref(), Some("delta.zip"));
        assert_eq!(listed(&manifest), vec!["lists/hosts.txt", "lists/new.txt"]);
        assert_eq!(manifest.delete.iter().map(|p| p.as_str()).collect::<Vec<_>>(), vec!["bin/winws.exe"]);
        assert_eq!(archive_names(&artifacts.package), vec!["lists/hosts.txt", "lists/new.txt"]);
        assert_eq!(artifacts.deleted, 1);
    }

    #[test_context(ReleaseContext)]
    #[test]
    fn output_inside_input_is_not_shipped(ctx: &mut ReleaseContext) {
        let nested_out = ctx.input.join("out");
        ReleaseBuilder::new(&ctx.input, ReleaseOptions::new("v1.4")).build(&nested_out).unwrap();
        let artifacts = ReleaseBuilder::new(&ctx.input, ReleaseOptions::new("v1.4")).build(&nested_out).unwrap();

        let manifest = Manifest::load(&artifacts.manifest).unwrap();
        assert!(listed(&manifest).iter().all(|p| !p.starts_with("out/")));
    }
}
