//! Browser executable discovery.

use std::path::{Path, PathBuf};

pub(super) fn find_chrome_executable() -> Option<PathBuf> {
    candidates().into_iter().find_map(|candidate| {
        if candidate.contains('/') || candidate.contains('\\') {
            let path = PathBuf::from(&candidate);
            path.exists().then_some(path)
        } else {
            which::which(&candidate).ok()
        }
    })
}

fn candidates() -> Vec<String> {
    if cfg!(target_os = "macos") {
        [
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
            "/Applications/Brave Browser.app/Contents/MacOS/Brave Browser",
        ]
        .into_iter()
        .map(str::to_string)
        .collect()
    } else if cfg!(target_os = "windows") {
        windows_candidates()
    } else {
        [
            "google-chrome-stable",
            "google-chrome",
            "chromium-browser",
            "chromium",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/google-chrome",
            "/usr/bin/chromium-browser",
            "/usr/bin/chromium",
            "/snap/bin/chromium",
        ]
        .into_iter()
        .map(str::to_string)
        .collect()
    }
}

fn windows_candidates() -> Vec<String> {
    let mut roots: Vec<PathBuf> = ["PROGRAMFILES", "PROGRAMFILES(X86)", "LOCALAPPDATA"]
        .into_iter()
        .filter_map(|key| std::env::var(key).ok().map(PathBuf::from))
        .collect();
    if roots.is_empty() {
        roots.push(PathBuf::from(r"C:\Program Files"));
        roots.push(PathBuf::from(r"C:\Program Files (x86)"));
    }

    let suffixes: &[&[&str]] = &[
        &["Google", "Chrome", "Application", "chrome.exe"],
        &["Microsoft", "Edge", "Application", "msedge.exe"],
        &["Chromium", "Application", "chrome.exe"],
    ];

    roots
        .iter()
        .flat_map(|root| suffixes.iter().map(move |suffix| join_all(root, suffix)))
        .map(|p| p.display().to_string())
        .collect()
}

fn join_all(root: &Path, parts: &[&str]) -> PathBuf {
    let mut path = root.to_path_buf();
    for part in parts {
        path.push(part);
    }
    path
}
