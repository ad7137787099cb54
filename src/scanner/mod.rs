mod walk;

pub use walk::{classify_files, ScanOutput};

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn media_extensions() -> Vec<String> {
        vec!["jpg".to_string(), "mp4".to_string(), "mp".to_string()]
    }

    #[test]
    fn test_classify_files() {
        let tmp = tempfile::tempdir().unwrap();
        let album = tmp.path().join("Trip");
        fs::create_dir_all(&album).unwrap();
        fs::write(album.join("a.JPG"), b"a").unwrap();
        fs::write(album.join("a.JPG.json"), b"{}").unwrap();
        fs::write(album.join("clip.mp4"), b"v").unwrap();
        fs::write(album.join("notes.txt"), b"t").unwrap();
        fs::write(album.join("._a.JPG"), b"x").unwrap();
        fs::write(album.join("metadata.json"), b"{}").unwrap();

        let root = tmp.path().to_string_lossy().into_owned();
        let output = classify_files(&[&root], &[], &media_extensions(), "json", |_| {}).unwrap();

        let names = |paths: &[std::path::PathBuf]| -> Vec<String> {
            paths
                .iter()
                .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
                .collect()
        };
        assert_eq!(names(&output.media), vec!["a.JPG", "clip.mp4"]);
        assert_eq!(names(&output.sidecars), vec!["a.JPG.json", "metadata.json"]);
        assert_eq!(output.ignored, 1);
        assert_eq!(output.unknown.get("txt").map(|(count, _)| *count), Some(1));
        assert_eq!(output.total_files(), 6);
        assert!(output.media.iter().all(|p| p.is_absolute()));
    }

    #[test]
    fn test_ignore_patterns_skip_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let keep = tmp.path().join("keep");
        let skip = tmp.path().join("trash");
        fs::create_dir_all(&keep).unwrap();
        fs::create_dir_all(&skip).unwrap();
        fs::write(keep.join("a.jpg"), b"a").unwrap();
        fs::write(skip.join("b.jpg"), b"b").unwrap();

        let root = tmp.path().to_string_lossy().into_owned();
        let output =
            classify_files(&[&root], &["**/trash"], &media_extensions(), "json", |_| {}).unwrap();
        assert_eq!(output.media.len(), 1);
        assert!(output.media[0].ends_with("keep/a.jpg"));
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("nope").to_string_lossy().into_owned();
        assert!(classify_files(&[&missing], &[], &media_extensions(), "json", |_| {}).is_err());
    }
}
