use std::{
    fs::{self, File},
    io,
    path::{Path, PathBuf},
};

use log::{debug, warn};
use walkdir::WalkDir;

use crate::{
    progress::{CancellationToken, ProgressReporter},
    Result,
};

/// Filesystem-safe identifier: spaces become underscores and anything outside
/// `[A-Za-z0-9_.-]` is dropped. Case is kept.
pub fn sanitize_filename(text: &str) -> String {
    text.chars()
        .map(|c| if c == ' ' { '_' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        .collect()
}

/// Removes a directory tree, treating "already gone" as success.
pub fn remove_dir_if_exists<P>(path: P) -> io::Result<()>
where
    P: AsRef<Path>,
{
    match fs::remove_dir_all(path.as_ref()) {
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

/// Extracts every member of `archive_path` into `destination`.
///
/// Reports `(members, extracted)` on the step bar and the member name on the
/// detail label. Returns early, without error, once `cancel` is triggered;
/// the caller decides what a partial extraction means.
pub fn extract_zip(
    archive_path: &Path,
    destination: &Path,
    reporter: &dyn ProgressReporter,
    step: usize,
    cancel: &CancellationToken,
) -> Result<()> {
    let file = File::open(archive_path)?;
    let mut archive = zip::ZipArchive::new(file)?;
    let total = archive.len() as u64;

    fs::create_dir_all(destination)?;

    for i in 0..archive.len() {
        if cancel.is_cancelled() {
            debug!("Extraction of {} cancelled", archive_path.display());
            return Ok(());
        }

        let mut member = archive.by_index(i)?;
        let name = member.name().to_string();

        // enclosed_name() rejects absolute paths and `..` escapes
        let safe_path = match member.enclosed_name() {
            Some(path) => path.to_owned(),
            None => {
                warn!("Skipping unsafe archive entry {}", name);
                continue;
            }
        };
        let output_path = destination.join(safe_path);

        if member.is_dir() {
            fs::create_dir_all(&output_path)?;
        } else {
            if let Some(parent) = output_path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut outfile = File::create(&output_path)?;
            io::copy(&mut member, &mut outfile)?;
        }

        reporter.step_progress(total, i as u64 + 1, step);
        reporter.detail(&format!("Extracting: {}", name));
    }

    Ok(())
}

/// Copies the contents of `src` over `dst`, overwriting existing files.
///
/// A file that fails to copy is logged and reported on the detail label,
/// then skipped. Returns the number of files copied.
pub fn copy_tree_with_progress(
    src: &Path,
    dst: &Path,
    reporter: &dyn ProgressReporter,
    step: usize,
    cancel: &CancellationToken,
) -> Result<u64> {
    let files: Vec<PathBuf> = WalkDir::new(src)
        .into_iter()
        .filter_map(|x| x.ok())
        .filter(|x| x.file_type().is_file())
        .map(|x| x.into_path())
        .collect();
    let total = files.len() as u64;
    let mut done = 0;

    fs::create_dir_all(dst)?;

    for src_file in files {
        if cancel.is_cancelled() {
            break;
        }
        let rel_path = match src_file.strip_prefix(src) {
            Ok(rel) => rel.to_path_buf(),
            Err(_) => continue,
        };
        let dst_file = dst.join(&rel_path);
        reporter.detail(&format!("Copying {}", rel_path.display()));

        let copied = dst_file
            .parent()
            .map(fs::create_dir_all)
            .unwrap_or(Ok(()))
            .and_then(|_| fs::copy(&src_file, &dst_file));
        if let Err(err) = copied {
            warn!("Failed to copy {}: {}", src_file.display(), err);
            reporter.detail(&format!("Failed to copy {}: {}", src_file.display(), err));
            continue;
        }

        done += 1;
        reporter.step_progress(total, done, step);
    }

    Ok(done)
}

/// Moves `src` to `dst`. When `dst` already exists the two trees are merged,
/// entries from `src` replacing same-named files in `dst`.
pub fn move_dir_merge(src: &Path, dst: &Path) -> Result<()> {
    if !dst.exists() {
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)?;
        }
        if fs::rename(src, dst).is_ok() {
            return Ok(());
        }
    }

    for entry in WalkDir::new(src).min_depth(1) {
        let entry = entry?;
        let Ok(rel_path) = entry.path().strip_prefix(src) else {
            continue;
        };
        let target = dst.join(rel_path);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
        }
    }
    fs::remove_dir_all(src)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::progress::{BarTarget, LabelTarget, Silent};

    /// Triggers the token on the first bar update, as a user cancelling
    /// right after work starts.
    struct CancelOnFirstUpdate(CancellationToken);

    impl ProgressReporter for CancelOnFirstUpdate {
        fn step(&self, _text: &str, _target: LabelTarget) {}

        fn progress(&self, _total: u64, _progress: u64, _target: BarTarget, _step: usize) {
            self.0.cancel();
        }
    }

    fn write_zip(path: &Path, names: &[&str]) {
        let mut writer = zip::ZipWriter::new(File::create(path).unwrap());
        for name in names {
            writer
                .start_file(*name, zip::write::SimpleFileOptions::default())
                .unwrap();
            writer.write_all(name.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn sanitize_strips_unsafe_characters() {
        assert_eq!(sanitize_filename("All The Mods 9"), "All_The_Mods_9");
        assert_eq!(sanitize_filename("Fabulously/Optimized: 5.0"), "FabulouslyOptimized_5.0");
        assert_eq!(sanitize_filename("Café-Pack"), "Caf-Pack");
    }

    #[test]
    fn copy_tree_overwrites_and_counts_files() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("src");
        let dst = tmp.path().join("dst");
        fs::create_dir_all(src.join("config/sub")).unwrap();
        fs::write(src.join("config/sub/a.toml"), "new").unwrap();
        fs::write(src.join("server.properties"), "motd=hi").unwrap();
        fs::create_dir_all(dst.join("config/sub")).unwrap();
        fs::write(dst.join("config/sub/a.toml"), "old").unwrap();

        let copied =
            copy_tree_with_progress(&src, &dst, &Silent, 4, &CancellationToken::new()).unwrap();

        assert_eq!(copied, 2);
        assert_eq!(fs::read_to_string(dst.join("config/sub/a.toml")).unwrap(), "new");
        assert!(dst.join("server.properties").exists());
    }

    #[test]
    fn copy_tree_skips_files_that_fail_to_copy() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("src");
        let dst = tmp.path().join("dst");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("a.toml"), "a").unwrap();
        fs::write(src.join("b.toml"), "b").unwrap();
        // a directory where a file should land cannot be overwritten
        fs::create_dir_all(dst.join("a.toml")).unwrap();

        let copied =
            copy_tree_with_progress(&src, &dst, &Silent, 4, &CancellationToken::new()).unwrap();

        assert_eq!(copied, 1);
        assert!(dst.join("a.toml").is_dir());
        assert_eq!(fs::read_to_string(dst.join("b.toml")).unwrap(), "b");
    }

    #[test]
    fn extraction_stops_once_cancelled() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = tmp.path().join("pack.zip");
        let out = tmp.path().join("out");
        write_zip(&archive, &["first.txt", "second.txt", "third.txt"]);

        let cancel = CancellationToken::new();
        extract_zip(&archive, &out, &CancelOnFirstUpdate(cancel.clone()), 2, &cancel).unwrap();

        assert!(cancel.is_cancelled());
        assert!(out.join("first.txt").exists());
        assert!(!out.join("second.txt").exists());
        assert!(!out.join("third.txt").exists());
    }

    #[test]
    fn move_dir_merges_into_existing_target() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("datapacks");
        let dst = tmp.path().join("world/datapacks");
        fs::create_dir_all(&src).unwrap();
        fs::create_dir_all(&dst).unwrap();
        fs::write(src.join("a.zip"), "a").unwrap();
        fs::write(dst.join("b.zip"), "b").unwrap();

        move_dir_merge(&src, &dst).unwrap();

        assert!(!src.exists());
        assert!(dst.join("a.zip").exists());
        assert!(dst.join("b.zip").exists());
    }
}
