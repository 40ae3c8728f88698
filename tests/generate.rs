// tests/generate.rs

//! End-to-end conversion tests: fixture source trees in, target spec trees
//! out.

mod common;

use common::{Fixture, keys};
use portconv::{Error, PortageConverter, RunReport};
use std::fs;

fn run(options: portconv::ConverterOptions) -> portconv::Result<RunReport> {
    PortageConverter::new(options)?.generate()
}

fn sorted(mut v: Vec<String>) -> Vec<String> {
    v.sort();
    v
}

#[test]
fn test_generate_with_dependencies() {
    let fx = Fixture::new();
    fx.package(
        "app-misc/foo-1.0",
        &[
            ("DESCRIPTION", "Foo tool"),
            ("LICENSE", "MIT"),
            ("IUSE", "+ssl"),
            ("DEPEND", "dev-util/cmake"),
            ("RDEPEND", "dev-libs/zlib ssl? ( dev-libs/openssl )"),
            ("SRC_URI", "https://example.org/foo-1.0.tar.gz"),
        ],
    )
    .package("dev-util/cmake-3.27", &[])
    .package("dev-libs/zlib-1.3", &[])
    .package("dev-libs/openssl-3.0", &[])
    .manifest(
        "app-misc/foo",
        "DIST foo-1.0.tar.gz 100 SHA512 abc\nEBUILD foo-1.0.ebuild 10 SHA512 def\n",
    );

    let report = run(fx.options(&["app-misc/foo"])).unwrap();
    assert!(report.is_success());
    assert_eq!(
        report.generated,
        vec![
            "app-misc/foo-1.0",
            "dev-libs/openssl-3.0",
            "dev-libs/zlib-1.3",
            "dev-util/cmake-3.27",
        ]
    );

    let definition = fx.definition("app-misc", "foo", "1.0");
    assert_eq!(definition.description.as_deref(), Some("Foo tool"));
    assert_eq!(
        sorted(keys(&definition.requires)),
        vec!["dev-libs/openssl", "dev-libs/zlib"]
    );
    assert_eq!(
        definition.labels.get("original.package.name").map(String::as_str),
        Some("app-misc/foo")
    );
    assert_eq!(
        definition.labels.get("original.package.version").map(String::as_str),
        Some("1.0")
    );

    let build = fx.build("app-misc", "foo", "1.0");
    assert_eq!(build["source"].as_str(), Some("app-misc/foo-1.0"));
    assert_eq!(build["requires"][0]["name"].as_str(), Some("cmake"));
    assert!(build["manifest_md5"].as_str().is_some_and(|m| m.len() == 32));
    assert!(build["archive"]["ignore_regexes"].is_sequence());

    let dir = fx.emitted("app-misc", "foo", "1.0");
    let manifest = fs::read_to_string(dir.join("Manifest")).unwrap();
    assert_eq!(manifest, "DIST foo-1.0.tar.gz 100 SHA512 abc\n");
    assert!(!dir.join("finalize.yaml").exists());

    // No distfiles, no manifest
    assert!(!fx.emitted("dev-util", "cmake", "3.27").join("Manifest").exists());
    assert!(fx.emitted("dev-util", "cmake", "3.27").join("build.yaml").is_file());
}

#[test]
fn test_disabled_use_flag_drops_conditional_dependency() {
    let fx = Fixture::new();
    fx.package(
        "app-misc/foo-1.0",
        &[
            ("IUSE", "+ssl"),
            ("RDEPEND", "dev-libs/zlib ssl? ( dev-libs/openssl )"),
        ],
    )
    .package("dev-libs/zlib-1.3", &[])
    .package("dev-libs/openssl-3.0", &[]);

    let mut options = fx.options(&["app-misc/foo"]);
    options.disable_use_flags = vec!["ssl".to_string()];
    let report = run(options).unwrap();

    assert_eq!(report.generated, vec!["app-misc/foo-1.0", "dev-libs/zlib-1.3"]);
    assert_eq!(keys(&fx.definition("app-misc", "foo", "1.0").requires), vec!["dev-libs/zlib"]);
}

#[test]
fn test_missing_dependency_fails_package() {
    let fx = Fixture::new();
    fx.package("app-misc/foo-1.0", &[("RDEPEND", "dev-libs/nowhere")]);

    match run(fx.options(&["app-misc/foo"])) {
        Err(Error::PackageFailed { package, source }) => {
            assert_eq!(package, "app-misc/foo-1.0");
            assert!(matches!(*source, Error::MissingDependency { .. }));
        }
        other => panic!("expected missing dependency, got {:?}", other),
    }
    assert!(!fx.emitted("app-misc", "foo", "1.0").exists());
}

#[test]
fn test_missing_dependency_ignored() {
    let fx = Fixture::new();
    fx.package(
        "app-misc/foo-1.0",
        &[("RDEPEND", "dev-libs/nowhere dev-libs/zlib")],
    )
    .package("dev-libs/zlib-1.3", &[]);

    let mut options = fx.options(&["app-misc/foo"]);
    options.ignore_missing_deps = true;
    let report = run(options).unwrap();

    assert!(report.is_success());
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].contains("dev-libs/nowhere"));
    assert_eq!(keys(&fx.definition("app-misc", "foo", "1.0").requires), vec!["dev-libs/zlib"]);
}

#[test]
fn test_any_of_picks_first_resolvable() {
    let fx = Fixture::new();
    fx.package(
        "app-misc/foo-1.0",
        &[("RDEPEND", "|| ( dev-libs/nowhere dev-libs/zlib )")],
    )
    .package("dev-libs/zlib-1.3", &[]);

    let report = run(fx.options(&["app-misc/foo"])).unwrap();
    assert!(report.is_success());
    assert_eq!(keys(&fx.definition("app-misc", "foo", "1.0").requires), vec!["dev-libs/zlib"]);
}

#[test]
fn test_shared_dependency_generated_once() {
    let fx = Fixture::new();
    for name in ["a", "b", "c", "d", "e"] {
        fx.package(&format!("app-misc/{}-1", name), &[("RDEPEND", "dev-libs/common")]);
    }
    fx.package("dev-libs/common-2.0", &[]);

    let mut options = fx.options(&[]);
    options.jobs = Some(4);
    let converter = PortageConverter::new(options).unwrap();
    let report = converter.generate().unwrap();

    assert_eq!(report.generated.len(), 6);
    assert_eq!(
        report.generated.iter().filter(|g| *g == "dev-libs/common-2.0").count(),
        1
    );
    assert_eq!(converter.registry().get_sorted_by_key("dev-libs/common").unwrap().len(), 1);
    for name in ["a", "b", "c", "d", "e"] {
        assert_eq!(
            keys(&fx.definition("app-misc", name, "1").requires),
            vec!["dev-libs/common"]
        );
    }
}

#[test]
fn test_runtime_cycle_is_an_error() {
    let fx = Fixture::new();
    fx.package("app-misc/a-1", &[("RDEPEND", "app-misc/b")])
        .package("app-misc/b-1", &[("RDEPEND", "app-misc/a")]);

    match run(fx.options(&["app-misc/a"])) {
        Err(Error::PackageFailed { source, .. }) => match *source {
            Error::CycleError { chain } => {
                assert_eq!(chain, vec!["app-misc/a-1", "app-misc/b-1", "app-misc/a-1"]);
            }
            other => panic!("expected cycle, got {:?}", other),
        },
        other => panic!("expected cycle, got {:?}", other),
    }
    assert!(!fx.target().join("app-misc").exists());
}

#[test]
fn test_post_dependency_cycle_is_tolerated() {
    let fx = Fixture::new();
    fx.package("app-misc/a-1", &[("PDEPEND", "app-misc/b")])
        .package("app-misc/b-1", &[("RDEPEND", "app-misc/a")]);

    let mut options = fx.options(&["app-misc/a"]);
    options.enable_stage4 = true;
    let report = run(options).unwrap();

    assert_eq!(report.generated, vec!["app-misc/a-1"]);
    assert_eq!(report.warnings.len(), 1);
    assert!(fx.definition("app-misc", "a", "1").requires.is_empty());
}

#[test]
fn test_post_dependencies_merge_into_runtime() {
    let fx = Fixture::new();
    fx.package(
        "app-misc/a-1",
        &[("RDEPEND", "dev-libs/zlib"), ("PDEPEND", "app-misc/plugin")],
    )
    .package("app-misc/plugin-1", &[])
    .package("dev-libs/zlib-1.3", &[]);

    let mut options = fx.options(&["app-misc/a"]);
    let report = run(options.clone()).unwrap();
    assert_eq!(report.generated, vec!["app-misc/a-1", "dev-libs/zlib-1.3"]);

    options.enable_stage4 = true;
    options.override_existing = true;
    run(options).unwrap();
    assert_eq!(
        keys(&fx.definition("app-misc", "a", "1").requires),
        vec!["dev-libs/zlib", "app-misc/plugin"]
    );
}

#[test]
fn test_existing_specs_are_skipped_unless_overridden() {
    let fx = Fixture::new();
    fx.package("app-misc/foo-1.0", &[("RDEPEND", "dev-libs/zlib")])
        .package("dev-libs/zlib-1.3", &[]);

    let report = run(fx.options(&["dev-libs/zlib"])).unwrap();
    assert_eq!(report.generated, vec!["dev-libs/zlib-1.3"]);

    let report = run(fx.options(&["app-misc/foo"])).unwrap();
    assert_eq!(report.generated, vec!["app-misc/foo-1.0"]);
    assert_eq!(report.skipped, vec!["dev-libs/zlib-1.3"]);
    assert_eq!(keys(&fx.definition("app-misc", "foo", "1.0").requires), vec!["dev-libs/zlib"]);

    let mut options = fx.options(&["app-misc/foo"]);
    options.override_existing = true;
    let report = run(options).unwrap();
    assert_eq!(report.generated, vec!["app-misc/foo-1.0", "dev-libs/zlib-1.3"]);
    assert!(report.skipped.is_empty());
}

#[test]
fn test_layer_skips_satisfied_packages() {
    let fx = Fixture::new();
    fx.package("app-misc/foo-1.0", &[("RDEPEND", "dev-libs/zlib")])
        .package("app-misc/bar-1.0", &[("RDEPEND", "dev-libs/openssl")])
        .package("dev-libs/zlib-1.3", &[])
        .package("dev-libs/openssl-3.0", &[]);
    run(fx.options(&["app-misc/foo"])).unwrap();

    let mut options = fx.options(&["app-misc/foo", "app-misc/bar"]);
    options.override_existing = true;
    options.layer4rdepends = true;
    let report = run(options).unwrap();

    assert_eq!(report.skipped, vec!["app-misc/foo-1.0"]);
    assert_eq!(report.generated, vec!["app-misc/bar-1.0", "dev-libs/openssl-3.0"]);
}

#[test]
fn test_shared_provides_conflict_on_both_sides() {
    let fx = Fixture::new();
    fx.package("app-editors/nano-7.2", &[])
        .package("app-editors/vim-9.0", &[])
        .package("app-editors/ed-1.19", &[]);
    let rules = fx.rules(
        r#"
[package."app-editors/vim"]
provides = ["virtual/editor"]

[package."app-editors/nano"]
provides = ["virtual/editor"]
"#,
    );

    let mut options = fx.options(&[]);
    options.rules_file = Some(rules.clone());
    run(options).unwrap();

    let nano = fx.definition("app-editors", "nano", "7.2");
    let vim = fx.definition("app-editors", "vim", "9.0");
    assert_eq!(keys(&nano.provides), vec!["virtual/editor"]);
    assert_eq!(keys(&nano.conflicts), vec!["app-editors/vim"]);
    assert_eq!(keys(&vim.conflicts), vec!["app-editors/nano"]);
    assert!(fx.definition("app-editors", "ed", "1.19").conflicts.is_empty());

    let mut options = fx.options(&[]);
    options.rules_file = Some(rules);
    options.override_existing = true;
    options.disable_conflicts = true;
    run(options).unwrap();
    assert!(fx.definition("app-editors", "vim", "9.0").conflicts.is_empty());
}

#[test]
fn test_blockers_become_conflicts() {
    let fx = Fixture::new();
    fx.package("app-misc/new-2", &[("RDEPEND", "!app-misc/old !!<dev-libs/zlib-1.2")]);

    run(fx.options(&["app-misc/new"])).unwrap();
    let definition = fx.definition("app-misc", "new", "2");
    assert!(definition.requires.is_empty());
    assert_eq!(keys(&definition.conflicts), vec!["app-misc/old", "dev-libs/zlib"]);
}

#[test]
fn test_native_packages_are_expanded() {
    let fx = Fixture::new();
    fx.package("app-misc/foo-1.0", &[("RDEPEND", "virtual/editor")])
        .package("virtual/editor-0", &[("RDEPEND", "app-editors/nano")])
        .package("app-editors/nano-7.2", &[]);

    let report = run(fx.options(&["app-misc/foo"])).unwrap();
    assert_eq!(report.generated, vec!["app-editors/nano-7.2", "app-misc/foo-1.0"]);
    assert_eq!(keys(&fx.definition("app-misc", "foo", "1.0").requires), vec!["app-editors/nano"]);
    assert!(!fx.target().join("virtual").exists());

    let report = run(fx.options(&["virtual/editor"])).unwrap();
    assert!(report.generated.is_empty());
    assert_eq!(report.skipped, vec!["virtual/editor-0"]);
}

#[test]
fn test_native_packages_emitted_on_request() {
    let fx = Fixture::new();
    fx.package("app-misc/foo-1.0", &[("RDEPEND", "virtual/editor")])
        .package("virtual/editor-0", &[("RDEPEND", "app-editors/nano")])
        .package("app-editors/nano-7.2", &[]);

    let mut options = fx.options(&["app-misc/foo"]);
    options.with_portage_pkgs = true;
    let report = run(options).unwrap();

    assert_eq!(report.generated.len(), 3);
    assert_eq!(keys(&fx.definition("app-misc", "foo", "1.0").requires), vec!["virtual/editor"]);
    assert_eq!(keys(&fx.definition("virtual", "editor", "0").requires), vec!["app-editors/nano"]);
}

#[test]
fn test_excluded_dependency_is_referenced_only() {
    let fx = Fixture::new();
    fx.package("app-misc/foo-1.0", &[("RDEPEND", "dev-lang/perl")])
        .package("dev-lang/perl-5.38", &[]);
    let rules = fx.rules("[global]\nexclude = [\"dev-lang/*\"]\n");

    let mut options = fx.options(&[]);
    options.rules_file = Some(rules);
    let report = run(options).unwrap();

    assert_eq!(report.generated, vec!["app-misc/foo-1.0"]);
    assert_eq!(keys(&fx.definition("app-misc", "foo", "1.0").requires), vec!["dev-lang/perl"]);
    assert!(!fx.target().join("dev-lang").exists());
}

#[test]
fn test_target_identity_and_finalizer() {
    let fx = Fixture::new();
    fx.package("dev-libs/foo-1.0", &[])
        .package("app-misc/bar-2", &[("RDEPEND", "dev-libs/foo")]);
    let rules = fx.rules(
        r#"
[package."dev-libs/foo"]
finalize = ["ldconfig"]
disable_stage2 = true
target = { category = "apps", name = "foo-runtime" }
"#,
    );

    let mut options = fx.options(&["app-misc/bar"]);
    options.rules_file = Some(rules);
    let report = run(options).unwrap();
    assert_eq!(report.generated, vec!["app-misc/bar-2", "apps/foo-runtime-1.0"]);

    let dir = fx.emitted("apps", "foo-runtime", "1.0");
    let definition = fx.definition("apps", "foo-runtime", "1.0");
    assert_eq!(definition.category, "apps");
    let build = fx.build("apps", "foo-runtime", "1.0");
    assert_eq!(build["category"].as_str(), Some("dev-libs"));
    assert_eq!(build["name"].as_str(), Some("foo"));

    let finalize = fs::read_to_string(dir.join("finalize.yaml")).unwrap();
    assert!(finalize.contains("ldconfig"));

    assert_eq!(keys(&fx.definition("app-misc", "bar", "2").requires), vec!["apps/foo-runtime"]);
}

#[test]
fn test_per_package_stage_rules() {
    let fx = Fixture::new();
    fx.package(
        "app-misc/foo-1.0",
        &[("DEPEND", "dev-util/cmake"), ("RDEPEND", "dev-libs/zlib")],
    )
    .package("dev-util/cmake-3.27", &[])
    .package("dev-libs/zlib-1.3", &[]);
    let rules = fx.rules("[package.\"app-misc/foo\"]\ndisable_stage3 = true\n");

    let mut options = fx.options(&["app-misc/foo"]);
    options.rules_file = Some(rules);
    let report = run(options).unwrap();

    assert_eq!(report.generated, vec!["app-misc/foo-1.0", "dev-libs/zlib-1.3"]);
    assert!(fx.build("app-misc", "foo", "1.0").get("requires").is_none());
}

#[test]
fn test_subsets_become_archive_ignores() {
    let fx = Fixture::new();
    fx.package("dev-libs/foo-1.0", &[]).package("app-misc/bar-1.0", &[]);
    let rules = fx.rules(
        r#"
[subsets]
enabled = ["devel"]

[subsets.categories."dev-libs".devel]
rules = ["^/usr/include"]

[subsets.categories."dev-libs".docs]
rules = ["^/usr/share/doc"]

[package."app-misc/bar".annotations]
subsets = { rules = { extras = ["^/opt/extras"] } }
"#,
    );

    let mut options = fx.options(&[]);
    options.rules_file = Some(rules);
    run(options).unwrap();

    let build = fx.build("dev-libs", "foo", "1.0");
    let ignores: Vec<&str> = build["archive"]["ignore_regexes"]
        .as_sequence()
        .unwrap()
        .iter()
        .filter_map(|v| v.as_str())
        .collect();
    assert_eq!(ignores, vec!["^/usr/share/doc"]);

    let definition = fx.definition("dev-libs", "foo", "1.0");
    let subsets = definition.annotations.get("subsets").unwrap();
    assert_eq!(subsets["rules"]["devel"][0], "^/usr/include");

    let build = fx.build("app-misc", "bar", "1.0");
    assert_eq!(build["archive"]["ignore_regexes"][0].as_str(), Some("^/opt/extras"));
}

#[test]
fn test_reposcan_seeds_distfiles() {
    let fx = Fixture::new();
    fx.package(
        "dev-libs/foo-1.0",
        &[("SRC_URI", "https://example.org/v1.0.tar.gz -> foo-1.0.tar.gz")],
    );
    fx.file(
        "kit-cache.json",
        r#"{"cache": {"dev-libs/foo-1.0": {"files": [
            {"name": "foo-1.0.tar.gz", "size": "42", "hashes": {"sha512": "beef"}}
        ]}}}"#,
    );
    let rules = fx.rules("[global]\nreposcan_sources = [\"kit-cache.json\"]\n");

    let mut options = fx.options(&["dev-libs/foo"]);
    options.rules_file = Some(rules);
    run(options).unwrap();

    let manifest = fs::read_to_string(fx.emitted("dev-libs", "foo", "1.0").join("Manifest")).unwrap();
    assert_eq!(manifest, "DIST foo-1.0.tar.gz 42 SHA512 beef\n");
}

#[test]
fn test_rules_package_filter_selects_working_set() {
    let fx = Fixture::new();
    fx.package("app-misc/a-1", &[]).package("app-misc/b-1", &[]);
    let rules = fx.rules("[global]\npackages = [\"app-misc/a\"]\n");

    let mut options = fx.options(&[]);
    options.rules_file = Some(rules);
    let report = run(options).unwrap();
    assert_eq!(report.generated, vec!["app-misc/a-1"]);
}

#[test]
fn test_continue_with_error_collects_failures() {
    let fx = Fixture::new();
    fx.package("app-misc/bad-1", &[("RDEPEND", "dev-libs/nowhere")])
        .package("app-misc/good-1", &[]);

    let mut options = fx.options(&[]);
    options.continue_with_error = true;
    let report = run(options).unwrap();

    assert!(!report.is_success());
    assert_eq!(report.failed, vec!["app-misc/bad-1"]);
    assert_eq!(report.generated, vec!["app-misc/good-1"]);
}

#[test]
fn test_unknown_requested_package() {
    let fx = Fixture::new();
    fx.package("app-misc/a-1", &[]);
    assert!(matches!(
        run(fx.options(&["app-misc/nope"])),
        Err(Error::NotFoundError(_))
    ));
    assert!(matches!(
        run(fx.options(&["not an atom"])),
        Err(Error::UsageError(_))
    ));
}

#[test]
fn test_missing_rules_file() {
    let fx = Fixture::new();
    let mut options = fx.options(&[]);
    options.rules_file = Some(fx.target().join("missing.toml"));
    assert!(matches!(
        PortageConverter::new(options),
        Err(Error::NotFoundError(_))
    ));
}

#[test]
fn test_emission_failure_ends_run_despite_continue_with_error() {
    let fx = Fixture::new();
    fx.package("app-misc/b-1", &[("RDEPEND", "dev-libs/c")])
        .package("dev-libs/c-1", &[]);
    // A plain file where the category directory has to go
    fx.file("out/dev-libs", "");

    let mut options = fx.options(&["app-misc/b"]);
    options.continue_with_error = true;
    let converter = PortageConverter::new(options).unwrap();

    match converter.generate() {
        Err(err @ Error::PackageFailed { .. }) => {
            assert!(err.is_fatal());
            let Error::PackageFailed { package, source } = err else {
                unreachable!()
            };
            assert_eq!(package, "app-misc/b-1");
            match *source {
                Error::EmissionError { package, source } => {
                    assert_eq!(package, "dev-libs/c-1");
                    assert!(matches!(*source, Error::IoError { .. }));
                }
                other => panic!("expected an emission error, got {:?}", other),
            }
        }
        other => panic!("expected the run to stop, got {:?}", other),
    }

    // The unwritten artifact is not left registered
    assert!(converter.registry().get_version("dev-libs/c", "1").is_err());
    assert!(!fx.emitted("app-misc", "b", "1").exists());
}

#[test]
fn test_annotation_and_manifest_problems_reach_report() {
    let fx = Fixture::new();
    fx.package(
        "app-misc/bar-1.0",
        &[("SRC_URI", "https://example.org/bar-1.0.tar.gz")],
    )
    .manifest(
        "app-misc/bar",
        "DIST bar-1.0.tar.gz 10 SHA512 abc\nDIST broken\n",
    );
    let rules = fx.rules("[package.\"app-misc/bar\".annotations]\nsubsets = \"bad\"\n");

    let mut options = fx.options(&["app-misc/bar"]);
    options.rules_file = Some(rules);
    let report = run(options).unwrap();

    assert_eq!(report.generated, vec!["app-misc/bar-1.0"]);
    assert_eq!(report.warnings.len(), 2, "warnings: {:?}", report.warnings);
    assert!(report
        .warnings
        .iter()
        .any(|w| w.starts_with("[app-misc/bar-1.0] Wrong format on subsets annotation")));
    assert!(report.warnings.iter().any(|w| {
        w.contains("app-misc/bar/Manifest") && w.ends_with("line 2: malformed DIST record, skipping")
    }));

    let manifest = fs::read_to_string(fx.emitted("app-misc", "bar", "1.0").join("Manifest")).unwrap();
    assert_eq!(manifest, "DIST bar-1.0.tar.gz 10 SHA512 abc\n");
}

#[test]
fn test_parallel_fan_in_generates_shared_dependency_once() {
    let fx = Fixture::new();
    fx.package("dev-libs/common-1.0", &[]);
    let mut requested: Vec<String> = (0..20)
        .map(|i| {
            let atom = format!("app-misc/p{:02}", i);
            fx.package(&format!("{}-1", atom), &[("RDEPEND", "dev-libs/common")]);
            atom
        })
        .collect();
    requested.push("dev-libs/common".to_string());
    let requested: Vec<&str> = requested.iter().map(String::as_str).collect();

    let mut options = fx.options(&requested);
    options.jobs = Some(4);
    let converter = PortageConverter::new(options).unwrap();
    let report = converter.generate().unwrap();

    assert!(report.is_success());
    assert!(report.skipped.is_empty());
    assert_eq!(report.generated.len(), 21);
    assert_eq!(
        report
            .generated
            .iter()
            .filter(|g| g.as_str() == "dev-libs/common-1.0")
            .count(),
        1
    );
    assert_eq!(converter.registry().get_sorted_by_key("dev-libs/common").unwrap().len(), 1);

    for i in 0..20 {
        let definition = fx.definition("app-misc", &format!("p{:02}", i), "1");
        assert_eq!(keys(&definition.requires), vec!["dev-libs/common"]);
    }
}

#[test]
fn test_parallel_dependents_of_failing_claim_all_fail() {
    let fx = Fixture::new();
    fx.package("dev-libs/broken-1", &[("RDEPEND", "dev-libs/nowhere")]);
    let mut requested: Vec<String> = (0..12)
        .map(|i| {
            let atom = format!("app-misc/d{:02}", i);
            fx.package(&format!("{}-1", atom), &[("RDEPEND", "dev-libs/broken")]);
            atom
        })
        .collect();
    requested.push("dev-libs/broken".to_string());
    let requested: Vec<&str> = requested.iter().map(String::as_str).collect();

    let mut options = fx.options(&requested);
    options.jobs = Some(4);
    options.continue_with_error = true;
    let converter = PortageConverter::new(options).unwrap();
    let report = converter.generate().unwrap();

    assert_eq!(report.failed.len(), 13);
    assert!(report.generated.is_empty());
    assert!(converter.registry().snapshot().is_empty());
    assert!(!fx.target().join("app-misc").exists());
    assert!(!fx.target().join("dev-libs").exists());
}
