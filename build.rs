use std::env;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use toml::Value;

/// Writes `APP_METADATA_*` constants into `$OUT_DIR/app_metadata.rs`,
/// which `libs::config` pulls in with `include!`.
struct MetadataWriter {
    out: BufWriter<File>,
}

impl MetadataWriter {
    fn create(out_dir: &Path) -> io::Result<Self> {
        let file = File::create(out_dir.join("app_metadata.rs"))?;
        Ok(Self { out: BufWriter::new(file) })
    }

    fn constant(&mut self, key: &str, value: &str) -> io::Result<()> {
        let name = key.replace('-', "_").to_uppercase();
        writeln!(self.out, "#[allow(unused)]\npub const APP_METADATA_{}: &str = {:?};", name, value)
    }

    fn finish(mut self) -> io::Result<()> {
        self.out.flush()
    }
}

fn main() -> io::Result<()> {
    println!("cargo:rerun-if-changed=Cargo.toml");

    let out_dir = env::var("OUT_DIR").map_err(io::Error::other)?;
    let manifest = fs::read_to_string("Cargo.toml")?;
    let manifest: Value = toml::from_str(&manifest).map_err(io::Error::other)?;

    let mut writer = MetadataWriter::create(Path::new(&out_dir))?;
    writer.constant("name", &env::var("CARGO_PKG_NAME").unwrap_or_default())?;
    writer.constant("version", &env::var("CARGO_PKG_VERSION").unwrap_or_default())?;

    // [package.metadata] carries the release repository and the bundle's
    // executable name; only string values become constants.
    let metadata = manifest.get("package").and_then(|pkg| pkg.get("metadata")).and_then(Value::as_table);
    for (key, value) in metadata.into_iter().flatten() {
        if let Some(value) = value.as_str() {
            writer.constant(key, value)?;
        }
    }

    writer.finish()
}
