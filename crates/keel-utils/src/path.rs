use std::{
    env,
    path::{Component, Path, PathBuf},
};

/// Returns the user's home directory, from `$HOME`, falling back to `/tmp`.
pub fn home_dir() -> PathBuf {
    env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| env::temp_dir())
}

/// Returns `$XDG_CONFIG_HOME`, or `$HOME/.config` when unset.
pub fn xdg_config_home() -> PathBuf {
    env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns `$XDG_DATA_HOME`, or `$HOME/.local/share` when unset.
pub fn xdg_data_home() -> PathBuf {
    env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Expands a leading `~` to the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~") {
        Some(rest) => home_dir().join(rest.trim_start_matches('/')),
        None => PathBuf::from(path),
    }
}

/// Whether `name` is a single plain path component, with no separators,
/// `.`/`..` or root.
pub fn is_plain_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(first)), None) => first == name && !name.contains('\\'),
        _ => false,
    }
}
