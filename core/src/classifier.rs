//! Path classification: which watch root owns a changed path.

use std::path::Path;

/// Find the registered watch root that owns `path`, if any.
///
/// Matching is segment-wise (`Path::starts_with` compares whole components),
/// so `/foo2/x` never matches root `/foo`. A path equal to a root matches
/// that root. When registered roots nest, the most specific (longest)
/// matching root wins.
///
/// Pure and side-effect free; `None` means the event should be dropped.
pub fn owning_root<'a, I>(path: &Path, roots: I) -> Option<&'a Path>
where
    I: IntoIterator<Item = &'a Path>,
{
    roots
        .into_iter()
        .filter(|root| path.starts_with(root))
        .max_by_key(|root| root.components().count())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn roots(paths: &[&str]) -> Vec<PathBuf> {
        paths.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn test_matches_path_under_root() {
        let roots = roots(&["/data"]);
        let owner = owning_root(Path::new("/data/sub/file.txt"), roots.iter().map(PathBuf::as_path));
        assert_eq!(owner, Some(Path::new("/data")));
    }

    #[test]
    fn test_path_equal_to_root_matches() {
        let roots = roots(&["/data"]);
        let owner = owning_root(Path::new("/data"), roots.iter().map(PathBuf::as_path));
        assert_eq!(owner, Some(Path::new("/data")));
    }

    #[test]
    fn test_segment_prefix_not_string_prefix() {
        // /abc must not match root /ab.
        let roots = roots(&["/ab"]);
        let owner = owning_root(Path::new("/abc/file.txt"), roots.iter().map(PathBuf::as_path));
        assert_eq!(owner, None);
    }

    #[test]
    fn test_most_specific_nested_root_wins() {
        let roots = roots(&["/a", "/a/b"]);
        let owner = owning_root(Path::new("/a/b/file.txt"), roots.iter().map(PathBuf::as_path));
        assert_eq!(owner, Some(Path::new("/a/b")));

        // Order of registration must not matter.
        let roots = self::roots(&["/a/b", "/a"]);
        let owner = owning_root(Path::new("/a/b/file.txt"), roots.iter().map(PathBuf::as_path));
        assert_eq!(owner, Some(Path::new("/a/b")));
    }

    #[test]
    fn test_unmatched_path_returns_none() {
        let roots = roots(&["/data", "/cache"]);
        let owner = owning_root(Path::new("/tmp/file.txt"), roots.iter().map(PathBuf::as_path));
        assert_eq!(owner, None);
    }
}
