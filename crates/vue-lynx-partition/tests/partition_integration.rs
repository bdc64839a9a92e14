//! Partitioning a small application tree

use std::collections::BTreeMap;
use std::fs;
use tempfile::TempDir;
use vue_lynx_partition::{
    collect_modules, expand_entries, inject_entry_glue, EntrySpec, GlueOptions, Layer, Origin,
    Partitioner, RuleSet, SyncTiming,
};

fn write(root: &TempDir, path: &str, contents: &str) {
    let full = root.path().join(path);
    fs::create_dir_all(full.parent().unwrap()).unwrap();
    fs::write(full, contents).unwrap();
}

fn sample_app() -> TempDir {
    let root = TempDir::new().unwrap();
    write(&root, "src/main.ts", "import { createApp } from 'vue';\n");
    write(&root, "src/store/cart.ts", "export const cart = [];\n");
    write(&root, "src/services/http.ts", "import 'background-only';\n");
    write(&root, "src/components/Cart.vue", "<template><view/></template>\n");
    write(&root, "src/views/Home.vue", "'use background';\nexport default {};\n");
    write(&root, "src/utils/format.ts", "// @lynx-background-thread\nexport {};\n");
    root
}

#[test]
fn test_store_module_goes_to_background() {
    let rules = RuleSet::from_patterns([
        ("ui", Layer::MainThread, r"(components|views|pages)"),
        ("logic", Layer::Background, r"(store|services|api)"),
    ])
    .unwrap();
    let partitioner = Partitioner::new(rules, Layer::MainThread);
    assert_eq!(partitioner.classify("src/store/cart.ts"), Layer::Background);
}

#[test]
fn test_plan_over_collected_tree() {
    let root = sample_app();
    let modules = collect_modules(
        root.path(),
        &["src/**/*.ts".to_string(), "src/**/*.vue".to_string(), "src/**/*".to_string()],
    )
    .unwrap();
    assert_eq!(modules.len(), 6);

    let plan = Partitioner::default().plan(&modules);
    let summary: Vec<_> = plan
        .decisions
        .iter()
        .map(|d| (d.path.as_str(), d.layer, d.origin.clone()))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("src/components/Cart.vue", Layer::MainThread, Origin::Rule("ui".into())),
            ("src/main.ts", Layer::MainThread, Origin::Fallback),
            ("src/services/http.ts", Layer::Background, Origin::Rule("logic".into())),
            ("src/store/cart.ts", Layer::Background, Origin::Rule("logic".into())),
            ("src/utils/format.ts", Layer::Background, Origin::Directive),
            ("src/views/Home.vue", Layer::Background, Origin::Directive),
        ]
    );
    assert!(plan.is_ok());
}

#[test]
fn test_background_only_from_main_thread_fails_plan() {
    let root = sample_app();
    write(&root, "src/components/Leaky.vue", "import 'background-only';\n");
    let modules = collect_modules(root.path(), &["src/**/*.vue".to_string()]).unwrap();

    let plan = Partitioner::default().plan(&modules);
    assert!(!plan.is_ok());
    assert_eq!(plan.violations[0].module, "src/components/Leaky.vue");
}

#[test]
fn test_split_entry_glue() {
    let mut entries = BTreeMap::new();
    entries.insert(
        "main".to_string(),
        EntrySpec::Split(BTreeMap::from([
            ("background".to_string(), "src/logic.ts".to_string()),
            ("main-thread".to_string(), "src/ui.ts".to_string()),
        ])),
    );

    for point in expand_entries(&entries) {
        let options =
            GlueOptions::new(&point.name, point.layer).with_timing(SyncTiming::Immediately);
        let glued = inject_entry_glue("export {};\n", &options).unwrap();
        let partitioner = Partitioner::default();
        let decision = partitioner.decide(&point.import, &glued);
        assert_eq!(decision.layer, point.layer);
        assert_eq!(decision.origin, Origin::Directive);
        assert_eq!(inject_entry_glue(&glued, &options).unwrap(), glued);
    }
}
