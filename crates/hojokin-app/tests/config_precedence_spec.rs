use std::{
    env,
    ffi::{OsStr, OsString},
    fs,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard, OnceLock},
};

use hojokin_app::config;
use tempfile::TempDir;

const TRACKED: [&str; 6] = [
    "HOME",
    "XDG_DATA_HOME",
    "HOJOKIN_CONFIG_FILE",
    "HOJOKIN__SERVER__LISTEN_ADDR",
    "HOJOKIN__PORTAL__PREF_ID",
    "HOJOKIN__STORAGE__DATA_DIR",
];

/// Serializes process-wide env and cwd changes; restores both on drop.
struct EnvSandbox {
    saved_vars: Vec<(&'static str, Option<OsString>)>,
    saved_cwd: PathBuf,
    _lock: MutexGuard<'static, ()>,
}

impl EnvSandbox {
    fn enter(cwd: &Path) -> Self {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        let lock = LOCK
            .get_or_init(Mutex::default)
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let sandbox = Self {
            saved_vars: TRACKED.iter().map(|&name| (name, env::var_os(name))).collect(),
            saved_cwd: env::current_dir().expect("current dir"),
            _lock: lock,
        };
        for name in TRACKED {
            sandbox.unset(name);
        }
        env::set_current_dir(cwd).expect("enter temp workspace");
        sandbox
    }

    fn set(&self, name: &str, value: impl AsRef<OsStr>) {
        // SAFETY: env mutation is serialized by the sandbox lock.
        unsafe { env::set_var(name, value) }
    }

    fn unset(&self, name: &str) {
        // SAFETY: as in `set`.
        unsafe { env::remove_var(name) }
    }
}

impl Drop for EnvSandbox {
    fn drop(&mut self) {
        let _ = env::set_current_dir(&self.saved_cwd);
        for (name, value) in std::mem::take(&mut self.saved_vars) {
            match value {
                Some(value) => self.set(name, value),
                None => self.unset(name),
            }
        }
    }
}

fn settings_toml(addr: &str, pref_id: u32) -> String {
    format!("[server]\nlisten_addr = \"{addr}\"\n\n[portal]\npref_id = {pref_id}\n")
}

#[test]
fn env_beats_override_file_beats_local_settings() {
    let workspace = TempDir::new().expect("temp workspace");
    let root = workspace.path();
    let env = EnvSandbox::enter(root);
    env.set("HOME", root);
    env.set("XDG_DATA_HOME", root.join("xdg_data"));

    let defaults = config::load().expect("defaults load");
    assert_eq!(defaults.server.listen_addr, "127.0.0.1:5000");
    assert_eq!(defaults.portal.base_url, "https://hojyokin-portal.jp/");
    assert_eq!(defaults.portal.pref_id, 18);
    assert_eq!(defaults.portal.request_timeout_secs, 30);
    assert_eq!(
        defaults.jgrants.base_url,
        "https://api.jgrants-portal.go.jp/exp/v1/public"
    );
    assert!(defaults.storage.data_dir.starts_with(root.join("xdg_data")));

    fs::create_dir_all(root.join("config")).expect("config dir");
    fs::write(root.join("config/settings.toml"), settings_toml("127.0.0.1:9003", 13))
        .expect("local settings");
    let override_file = root.join("override.toml");
    fs::write(&override_file, settings_toml("127.0.0.1:9004", 27)).expect("override file");

    env.set("HOJOKIN_CONFIG_FILE", &override_file);
    env.set("HOJOKIN__SERVER__LISTEN_ADDR", "127.0.0.1:9005");
    env.set("HOJOKIN__STORAGE__DATA_DIR", root.join("scrapes"));
    let layered = config::load().expect("all layers load");
    assert_eq!(layered.server.listen_addr, "127.0.0.1:9005");
    assert_eq!(layered.portal.pref_id, 27);
    assert_eq!(layered.storage.data_dir, root.join("scrapes"));

    env.unset("HOJOKIN__SERVER__LISTEN_ADDR");
    assert_eq!(
        config::load().expect("override layer loads").server.listen_addr,
        "127.0.0.1:9004"
    );

    env.unset("HOJOKIN_CONFIG_FILE");
    let local = config::load().expect("local layer loads");
    assert_eq!(local.server.listen_addr, "127.0.0.1:9003");
    assert_eq!(local.portal.pref_id, 13);

    env.set("HOJOKIN__PORTAL__PREF_ID", "40");
    assert_eq!(config::load().expect("numeric env parses").portal.pref_id, 40);

    env.set("HOJOKIN_CONFIG_FILE", root.join("missing.toml"));
    assert!(config::load().is_err(), "a named config file must exist");
}
