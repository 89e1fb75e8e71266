use std::io;
use std::path::PathBuf;

pub const COUNTERTOOL_HOME_ENV: &str = "COUNTERTOOL_HOME";

/// Resolves the directory that holds `config.toml`, the cursor file and every
/// relative path named in the config.
///
/// `COUNTERTOOL_HOME` wins when set and must name an existing directory (it is
/// canonicalized). Otherwise `~/.countertool` is returned without checking
/// that it exists.
pub fn find_countertool_home() -> io::Result<PathBuf> {
    let from_env = std::env::var(COUNTERTOOL_HOME_ENV)
        .ok()
        .filter(|val| !val.is_empty());
    resolve_home(from_env.as_deref())
}

fn resolve_home(from_env: Option<&str>) -> io::Result<PathBuf> {
    let Some(val) = from_env else {
        let home = dirs::home_dir()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no home directory"))?;
        return Ok(home.join(".countertool"));
    };

    let path = PathBuf::from(val);
    let metadata = std::fs::metadata(&path).map_err(|err| {
        io::Error::new(
            err.kind(),
            format!("{COUNTERTOOL_HOME_ENV} is {val:?} but it cannot be read: {err}"),
        )
    })?;
    if !metadata.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{COUNTERTOOL_HOME_ENV} is {val:?} but it is not a directory"),
        ));
    }
    path.canonicalize()
}

#[cfg(test)]
mod tests {
    use super::resolve_home;
    use pretty_assertions::assert_eq;
    use std::fs;
    use std::io::ErrorKind;
    use tempfile::TempDir;

    #[test]
    fn missing_env_directory_is_an_error() {
        let tmp = TempDir::new().expect("tempdir");
        let missing = tmp.path().join("absent");

        let err = resolve_home(missing.to_str()).expect_err("absent home");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.to_string().contains("COUNTERTOOL_HOME"), "{err}");
    }

    #[test]
    fn env_pointing_at_file_is_rejected() {
        let tmp = TempDir::new().expect("tempdir");
        let file = tmp.path().join("config.toml");
        fs::write(&file, "").expect("write");

        let err = resolve_home(file.to_str()).expect_err("file home");
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn env_directory_is_canonicalized() {
        let tmp = TempDir::new().expect("tempdir");
        let nested = tmp.path().join("nested");
        fs::create_dir(&nested).expect("mkdir");
        let dotted = nested.join("..").join("nested");

        let resolved = resolve_home(dotted.to_str()).expect("home");
        assert_eq!(resolved, nested.canonicalize().expect("canonicalize"));
    }

    #[test]
    fn default_home_ends_with_dot_countertool() {
        let resolved = resolve_home(None).expect("default home");
        assert!(resolved.ends_with(".countertool"));
    }
}
