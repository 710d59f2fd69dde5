//! Layout persistence: saving, refusing to overwrite, listing and restoring.

use fgcanvas::canvas::ConnectionState;
use fgcanvas::layout::{LayoutStore, SavedLayout};
use fgcanvas::{CanvasError, ConnectionStatus, ViewerApp, ViewerConfig};

fn blob(root: &str) -> ConnectionState {
    ConnectionState {
        host: String::new(),
        port: 0,
        root_path: root.into(),
        snapshot: None,
    }
}

#[test]
fn save_refuses_to_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let store = LayoutStore::new(dir.path());
    let layout = SavedLayout {
        config_name: "Captain side".into(),
        canvases: vec![blob("/canvas/by-index/texture[0]")],
    };

    let path = store.save(&layout).unwrap();
    assert_eq!(path, dir.path().join("Captain_side.json"));
    assert_eq!(store.load(&path).unwrap(), layout);

    let again = store.save(&layout);
    assert!(matches!(again, Err(CanvasError::FileExists(p)) if p == path));
}

#[test]
fn list_reads_config_names_and_skips_junk() {
    let dir = tempfile::tempdir().unwrap();
    let store = LayoutStore::new(dir.path());
    for name in ["b-panel", "a panel"] {
        store
            .save(&SavedLayout {
                config_name: name.into(),
                canvases: Vec::new(),
            })
            .unwrap();
    }
    std::fs::write(dir.path().join("broken.json"), "{").unwrap();
    std::fs::write(dir.path().join("notes.txt"), "hello").unwrap();

    let names: Vec<String> = store.list().unwrap().into_iter().map(|e| e.name).collect();
    assert_eq!(names, vec!["a panel".to_owned(), "b-panel".to_owned()]);
}

#[test]
fn snapshot_layout_restores_without_network() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("saved.json");
    std::fs::write(
        &path,
        r#"{
            "configName": "saved",
            "canvases": [{
                "host": "",
                "port": 0,
                "rootPath": "/canvas/by-index/texture[2]",
                "snapshot": {
                    "name": "texture", "index": 2,
                    "children": [
                        {"name": "size", "index": 0, "value": 300},
                        {"name": "size", "index": 1, "value": 200},
                        {"name": "text", "index": 0, "children": [
                            {"name": "text", "index": 0, "value": "ALT 3500"}
                        ]}
                    ]
                }
            }]
        }"#,
    )
    .unwrap();

    let mut app = ViewerApp::new(ViewerConfig::default(), LayoutStore::new(dir.path())).unwrap();
    app.restore_layout(&path).unwrap();

    let key = app.connections().keys()[0];
    let connection = app.connections().get(key).unwrap();
    assert_eq!(connection.status(), ConnectionStatus::Snapshot);
    assert_eq!(connection.name(), "texture[2]");
    assert_eq!(connection.scene().canvas_size(), (300.0, 200.0));

    let svg = app.render_svg(key, true).unwrap();
    assert!(svg.contains("ALT 3500"));

    let saved = app.save_state("again");
    assert_eq!(saved.canvases.len(), 1);
    assert!(saved.canvases[0].snapshot.is_some());
}
