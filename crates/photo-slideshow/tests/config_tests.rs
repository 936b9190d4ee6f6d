use std::path::PathBuf;
use std::time::Duration;

use photo_slideshow::config::{Configuration, DEFAULT_CONTROL_SOCKET_PATH, OrderMode};

#[test]
fn parse_kebab_case_config() {
    let yaml = r#"
photo-library-path: "/photos"
"#;
    let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(cfg.photo_library_path, PathBuf::from("/photos"));
    assert_eq!(
        cfg.control_socket_path,
        PathBuf::from(DEFAULT_CONTROL_SOCKET_PATH)
    );
    assert_eq!(cfg.crossfade, Duration::from_secs(1));
    assert!(cfg.autoplay);
    assert_eq!(cfg.settings.order, OrderMode::Sequential);
    assert!(cfg.validated().is_ok());
}

#[test]
fn parse_full_config() {
    let yaml = r#"
photo-library-path: "/photos"
manifest-path: "/etc/photo-slideshow/selection.yaml"
control-socket-path: "/tmp/slideshow.sock"
settings-path: "/var/lib/photo-slideshow/settings.yaml"
settings:
  speed: 4.5
  order: random
  overlay-visible: false
crossfade: 750ms
autoplay: false
shuffle-seed: 42
"#;
    let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
    let cfg = cfg.validated().unwrap();
    assert_eq!(
        cfg.manifest_path,
        Some(PathBuf::from("/etc/photo-slideshow/selection.yaml"))
    );
    assert_eq!(cfg.crossfade, Duration::from_millis(750));
    assert_eq!(cfg.settings.order, OrderMode::Random);
    assert!(!cfg.settings.overlay_visible);
    assert_eq!(cfg.settings.interval(), Some(Duration::from_millis(4500)));
    assert!(!cfg.autoplay);
    assert_eq!(cfg.shuffle_seed, Some(42));
}

#[test]
fn unknown_keys_are_rejected() {
    let yaml = r#"
photo-library-path: "/photos"
transition: fade
"#;
    assert!(serde_yaml::from_str::<Configuration>(yaml).is_err());
}

#[test]
fn missing_image_source_fails_validation() {
    let cfg: Configuration = serde_yaml::from_str("autoplay: true\n").unwrap();
    let err = cfg.validated().unwrap_err();
    assert!(err.to_string().contains("photo-library-path"));
}

#[test]
fn non_positive_speed_fails_validation() {
    let yaml = r#"
photo-library-path: "/photos"
settings:
  speed: 0
"#;
    let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
    assert!(cfg.validated().is_err());
}

#[test]
fn crossfade_must_fit_inside_interval() {
    let yaml = r#"
photo-library-path: "/photos"
settings:
  speed: 2
crossfade: 3s
"#;
    let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
    let err = cfg.validated().unwrap_err();
    assert!(err.to_string().contains("crossfade"));
}

#[test]
fn load_images_prefers_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let library = dir.path().join("library");
    std::fs::create_dir_all(&library).unwrap();
    std::fs::write(library.join("ignored.jpg"), b"jpg").unwrap();
    let manifest = dir.path().join("selection.yaml");
    std::fs::write(
        &manifest,
        "- id: 40\n  url: https://frame.local/40.jpg\n  title: Lighthouse\n",
    )
    .unwrap();

    let yaml = format!(
        "photo-library-path: {}\nmanifest-path: {}\n",
        library.display(),
        manifest.display()
    );
    let cfg: Configuration = serde_yaml::from_str(&yaml).unwrap();
    let images = cfg.validated().unwrap().load_images().unwrap();
    assert_eq!(images.len(), 1);
    assert_eq!(images[0].id, 40);
    assert_eq!(images[0].title, "Lighthouse");
}

#[test]
fn load_images_scans_library_without_manifest() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("b.jpg"), b"jpg").unwrap();
    std::fs::write(dir.path().join("a.png"), b"png").unwrap();

    let yaml = format!("photo-library-path: {}\n", dir.path().display());
    let cfg: Configuration = serde_yaml::from_str(&yaml).unwrap();
    let images = cfg.load_images().unwrap();
    let titles: Vec<_> = images.iter().map(|i| i.title.as_str()).collect();
    assert_eq!(titles, vec!["a", "b"]);
}
