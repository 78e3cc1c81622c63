use std::collections::HashSet;
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use tempfile::{tempdir, TempDir};
use warden_core::error::{AttributeError, Error, RegistryError};
use warden_core::id::ServiceId;
use warden_core::types::{attributes, Attributes, Principal};
use warden_core::utils::config::TieBreak;
use warden_policy::attributes::{
    AttributeSource, AttributeSourceDefinition, AttributeSources, CachingAttributeRepository,
    MergeStrategy, StaticAttributeSource, TimeUnit,
};
use warden_policy::engine::ServiceLookup;
use warden_policy::model::{
    AttributeFilter, AttributeReleasePolicy, AuthorizationStrategy, DefaultAuthorizationStrategy,
    ProxyPolicy, RegisteredService, ServiceKind, UsernameAttributeProvider,
};
use warden_registry::key::MAX_NAME_LEN;
use warden_registry::{JsonServiceRegistry, ServiceRegistry};

fn registry() -> (TempDir, JsonServiceRegistry) {
    let dir = tempdir().unwrap();
    let registry = JsonServiceRegistry::open(dir.path()).unwrap();
    (dir, registry)
}

fn literal(name: &str) -> RegisteredService {
    RegisteredService::literal(name, "testId")
        .with_theme("theme")
        .with_description("description")
}

/// Save, then check the stored entity equals both the input and the result.
fn assert_round_trip(registry: &JsonServiceRegistry, service: RegisteredService) -> RegisteredService {
    let saved = registry.save(service.clone()).unwrap();
    assert!(saved.id.is_assigned());
    assert_eq!(saved, service.with_id(saved.id));

    let found = registry.find_service_by_id(saved.id).unwrap().unwrap();
    assert_eq!(found, saved);
    found
}

fn allowed_with_filter() -> RegisteredService {
    RegisteredService::regex("testSaveAttributeReleasePolicyAllowedAttrRulesAndFilter", "testId")
        .with_theme("testtheme")
        .with_evaluation_order(1000)
        .with_authorization_strategy(DefaultAuthorizationStrategy::new(true, false))
        .with_proxy_policy(ProxyPolicy::regex("https://.+").unwrap())
        .with_required_handlers(["h1", "h2"])
        .with_attribute_release_policy(
            AttributeReleasePolicy::return_allowed(["1", "2", "3"])
                .with_attribute_filter(AttributeFilter::regex("\\w+").unwrap()),
        )
}

fn allowed_with_caching() -> RegisteredService {
    let repository = CachingAttributeRepository::new(
        StaticAttributeSource::new(attributes([("values", vec!["v1", "v2", "v3"])])),
        TimeUnit::Milliseconds,
        100,
    )
    .with_merge_strategy(MergeStrategy::Replace);

    RegisteredService::literal("testSaveAttributeReleasePolicyAllowedAttrRulesWithCaching", "testId")
        .with_attribute_release_policy(
            AttributeReleasePolicy::return_allowed(["1", "2", "3"])
                .with_principal_attributes_repository(repository),
        )
}

#[test]
fn test_save_without_attributes() {
    let (_dir, registry) = registry();
    assert_round_trip(&registry, literal("testSaveMethodWithNonExistentServiceAndNoAttributes"));
}

#[test]
fn test_save_with_username_providers() {
    let (_dir, registry) = registry();

    assert_round_trip(
        &registry,
        literal("testSaveMethodWithDefaultUsernameAttribute")
            .with_username_attribute_provider(UsernameAttributeProvider::Default),
    );
    assert_round_trip(
        &registry,
        literal("testSaveMethodWithDefaultPrincipalAttribute")
            .with_username_attribute_provider(UsernameAttributeProvider::principal_attribute("cn")),
    );
    assert_round_trip(
        &registry,
        literal("testSaveMethodWithDefaultAnonymousAttribute")
            .with_username_attribute_provider(UsernameAttributeProvider::anonymous()),
    );
}

#[test]
fn test_anonymous_provider_document_carries_no_salt() {
    let (dir, registry) = registry();
    let saved = registry
        .save(literal("anonymous").with_username_attribute_provider(UsernameAttributeProvider::anonymous()))
        .unwrap();

    let text = fs::read_to_string(dir.path().join(format!("anonymous-{}.json", saved.id))).unwrap();
    let json: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(
        json["usernameAttributeProvider"],
        serde_json::json!({"@type": "AnonymousUsernameAttributeProvider"})
    );
    assert!(!text.to_lowercase().contains("salt"));
}

#[test]
fn test_save_release_policies() {
    let (_dir, registry) = registry();

    let found = assert_round_trip(
        &registry,
        literal("testSaveAttributeReleasePolicy")
            .with_attribute_release_policy(AttributeReleasePolicy::return_all()),
    );
    assert_eq!(
        found.attribute_release_policy,
        Some(AttributeReleasePolicy::return_all())
    );

    let found = assert_round_trip(
        &registry,
        RegisteredService::literal("testSaveAttributeReleasePolicyMappingRules", "testId")
            .with_attribute_release_policy(AttributeReleasePolicy::return_mapped([
                ("attr1", "newattr1"),
                ("attr2", "newattr2"),
                ("attr2", "newattr3"),
            ])),
    );
    assert_eq!(
        found.attribute_release_policy,
        Some(AttributeReleasePolicy::return_mapped([
            ("attr1", "newattr1"),
            ("attr2", "newattr3"),
        ]))
    );

    assert_round_trip(
        &registry,
        RegisteredService::literal("testSaveAttributeReleasePolicyAllowedAttrRules", "testId")
            .with_attribute_release_policy(AttributeReleasePolicy::return_allowed(["1", "2", "3"])),
    );
    assert_round_trip(&registry, allowed_with_filter());
    assert_round_trip(&registry, allowed_with_caching());
}

#[test]
fn test_overwrite_keeps_latest_values() {
    let (_dir, registry) = registry();

    let saved = registry
        .save(literal("testSaveMethodWithExistingServiceNoAttribute"))
        .unwrap();
    let updated = registry
        .save(saved.clone().with_theme("mytheme"))
        .unwrap();

    let found = registry.find_service_by_id(saved.id).unwrap().unwrap();
    assert_eq!(found, updated);
    assert_eq!(found.theme.as_deref(), Some("mytheme"));
    assert_eq!(registry.size().unwrap(), 1);
}

#[test]
fn test_service_type_preserved() {
    let (dir, registry) = registry();

    let saved = registry
        .save(
            RegisteredService::regex("testServiceType", "^https://.+")
                .with_theme("testtheme")
                .with_evaluation_order(1000),
        )
        .unwrap();
    assert_eq!(saved.kind, ServiceKind::Regex);

    drop(registry);
    let reopened = JsonServiceRegistry::open(dir.path()).unwrap();
    let found = reopened.find_service_by_id(saved.id).unwrap().unwrap();
    assert_eq!(found.kind, ServiceKind::Regex);
}

#[test]
fn test_invalid_file_name_rejected() {
    let (dir, registry) = registry();
    registry.save(literal("existing")).unwrap();

    let result = registry.save(
        RegisteredService::regex("hell/o@world:*", "^https://.+").with_evaluation_order(1000),
    );
    assert!(matches!(
        result,
        Err(Error::Registry(RegistryError::InvalidName { .. }))
    ));
    assert_eq!(registry.size().unwrap(), 1);

    // No id was consumed by the failed save.
    let next = registry.save(literal("next")).unwrap();
    assert_eq!(next.id, ServiceId::new(2));
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 3);
}

#[test]
fn test_name_length_bounded_before_io() {
    let (dir, registry) = registry();

    let longest = registry
        .save(literal(&"x".repeat(MAX_NAME_LEN)).with_id(123_456_789))
        .unwrap();
    assert_eq!(longest.id, ServiceId::new(123_456_789));
    let sequence = fs::read_to_string(dir.path().join(".sequence")).unwrap();

    let result = registry.save(literal(&"y".repeat(MAX_NAME_LEN + 1)).with_id(987_654_321));
    assert!(matches!(
        result,
        Err(Error::Registry(RegistryError::InvalidName { .. }))
    ));
    assert_eq!(fs::read_to_string(dir.path().join(".sequence")).unwrap(), sequence);
    assert_eq!(registry.size().unwrap(), 1);
}

#[derive(Default)]
struct CountingSource {
    calls: AtomicUsize,
}

impl AttributeSource for CountingSource {
    fn resolve(&self, _principal_id: &str) -> Result<Attributes, AttributeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(attributes([("mail", vec!["casuser@example.org"])]))
    }
}

#[test]
fn test_found_services_keep_attribute_cache() {
    let (_dir, registry) = registry();
    let upstream = Arc::new(CountingSource::default());
    let sources = AttributeSources::new();
    sources.register("ldap", upstream.clone());

    let saved = registry
        .save(
            literal("cached").with_attribute_release_policy(
                AttributeReleasePolicy::return_all().with_principal_attributes_repository(
                    CachingAttributeRepository::new(
                        AttributeSourceDefinition::named("ldap"),
                        TimeUnit::Hours,
                        1,
                    ),
                ),
            ),
        )
        .unwrap();

    let principal = Principal::new("casuser");
    let release = |service: &RegisteredService| {
        let released = service
            .attribute_release_policy
            .as_ref()
            .unwrap()
            .release(&principal, &sources)
            .unwrap();
        assert_eq!(released["mail"], vec!["casuser@example.org".to_string()]);
    };

    for _ in 0..3 {
        release(&registry.find_service_by_id(saved.id).unwrap().unwrap());
    }
    for service in registry.load().unwrap().services {
        release(&service);
    }
    release(&registry.find_service_by_id(saved.id).unwrap().unwrap());

    assert_eq!(upstream.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_load_reflects_external_changes() {
    let (dir, registry) = registry();
    let kept = registry.save(literal("kept")).unwrap();
    let removed = registry.save(literal("removed")).unwrap();

    fs::remove_file(dir.path().join(format!("removed-{}.json", removed.id))).unwrap();
    let mut edited = kept.clone().with_theme("edited");
    edited.description = None;
    fs::write(
        dir.path().join(format!("kept-{}.json", kept.id)),
        serde_json::to_vec(&edited).unwrap(),
    )
    .unwrap();

    let services = registry.load().unwrap().into_services();
    assert_eq!(services, vec![edited.clone()]);
    assert!(registry.find_service_by_id(removed.id).unwrap().is_none());
    assert_eq!(registry.find_service_by_id(kept.id).unwrap().unwrap(), edited);
}

#[test]
fn test_loading_of_json_service_files() {
    let (_dir, registry) = registry();

    registry.save(allowed_with_caching()).unwrap();
    registry.save(allowed_with_filter()).unwrap();

    let report = registry.load().unwrap();
    assert!(report.is_complete());
    assert_eq!(report.services.len(), 2);
}

#[test]
fn test_service_removals() {
    let (_dir, registry) = registry();

    let saved: Vec<RegisteredService> = (1..5)
        .map(|i| {
            registry
                .save(
                    RegisteredService::regex("testServiceType", "^https://.+")
                        .with_theme("testtheme")
                        .with_evaluation_order(1000)
                        .with_id(i * 100),
                )
                .unwrap()
        })
        .collect();
    assert_eq!(registry.size().unwrap(), 4);

    for (removed, service) in saved.iter().enumerate() {
        registry.delete(service).unwrap();
        assert!(registry.find_service_by_id(service.id).unwrap().is_none());
        assert_eq!(registry.size().unwrap(), 4 - removed - 1);
    }

    // Deleting again is a no-op.
    registry.delete(&saved[0]).unwrap();
}

#[test]
fn test_authorization_strategy_persisted() {
    let (_dir, registry) = registry();

    let authz = DefaultAuthorizationStrategy::new(false, false)
        .with_require_all_attributes(true)
        .with_required_attribute("cn", ["v1, v2, v3"])
        .with_required_attribute("memberOf", ["v4, v5, v6"]);
    registry
        .save(
            RegisteredService::regex("checkForAuthorizationStrategy", "^https://.+")
                .with_id(42)
                .with_authorization_strategy(authz.clone()),
        )
        .unwrap();

    let services = registry.load().unwrap().into_services();
    assert_eq!(services.len(), 1);
    assert_eq!(
        services[0].authorization_strategy,
        AuthorizationStrategy::from(authz)
    );
}

#[test]
fn test_ids_unique_and_never_reused() {
    let (dir, registry) = registry();

    let first = registry.save(literal("first")).unwrap();
    let second = registry.save(literal("second")).unwrap();
    assert_ne!(first.id, second.id);

    registry.delete(&second).unwrap();
    drop(registry);

    let reopened = JsonServiceRegistry::open(dir.path()).unwrap();
    let third = reopened.save(literal("third")).unwrap();
    assert!(third.id > second.id);
}

#[test]
fn test_explicit_id_advances_sequence() {
    let (_dir, registry) = registry();

    registry.save(literal("fixed").with_id(500)).unwrap();
    let fresh = registry.save(literal("fresh")).unwrap();
    assert_eq!(fresh.id, ServiceId::new(501));
}

#[test]
fn test_rename_replaces_document() {
    let (dir, registry) = registry();

    let saved = registry.save(literal("before")).unwrap();
    let mut renamed = saved.clone();
    renamed.name = "after".to_string();
    registry.save(renamed).unwrap();

    let names: Vec<String> = fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|n| !n.starts_with('.'))
        .collect();
    assert_eq!(names, vec![format!("after-{}.json", saved.id)]);

    let found = registry.find_service_by_id(saved.id).unwrap().unwrap();
    assert_eq!(found.name, "after");
}

#[test]
fn test_corrupt_document_skipped() {
    let (dir, registry) = registry();

    registry.save(literal("good")).unwrap();
    fs::write(dir.path().join("broken-77.json"), b"{ not json").unwrap();
    fs::write(dir.path().join(".good-1.json.tmp-abandoned"), b"{").unwrap();
    fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

    let report = registry.load().unwrap();
    assert_eq!(report.services.len(), 1);
    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].path.ends_with("broken-77.json"));
    assert!(!report.is_complete());

    assert!(matches!(
        registry.find_service_by_id(ServiceId::new(77)),
        Err(Error::Registry(RegistryError::Corrupt { .. }))
    ));
}

#[test]
fn test_open_recovers_high_water_from_documents() {
    let (dir, registry) = registry();
    registry.save(literal("seed").with_id(40)).unwrap();
    drop(registry);

    fs::remove_file(dir.path().join(".sequence")).unwrap();
    let reopened = JsonServiceRegistry::open(dir.path()).unwrap();
    let fresh = reopened.save(literal("fresh")).unwrap();
    assert_eq!(fresh.id, ServiceId::new(41));
}

#[test]
fn test_find_service_by_url() {
    let (_dir, registry) = registry();

    registry
        .save(
            RegisteredService::regex("broad", "^https://.+")
                .with_id(1)
                .with_evaluation_order(10),
        )
        .unwrap();
    registry
        .save(
            RegisteredService::regex("also-broad", "^https://.+")
                .with_id(2)
                .with_evaluation_order(10),
        )
        .unwrap();

    let url = "https://app.example.org";
    let lowest = registry
        .find_service(url, &ServiceLookup::new(TieBreak::LowestId))
        .unwrap()
        .unwrap();
    assert_eq!(lowest.name, "broad");

    let highest = registry
        .find_service(url, &ServiceLookup::new(TieBreak::HighestId))
        .unwrap()
        .unwrap();
    assert_eq!(highest.name, "also-broad");

    assert!(registry
        .find_service("ftp://nothing", &ServiceLookup::default())
        .unwrap()
        .is_none());
}

#[test]
fn test_concurrent_saves_get_distinct_ids() {
    let (_dir, registry) = registry();
    let registry = Arc::new(registry);
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let registry = Arc::clone(&registry);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                (0..5)
                    .map(|i| {
                        registry
                            .save(literal(&format!("svc-{}-{}", t, i)))
                            .unwrap()
                            .id
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let ids: HashSet<ServiceId> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    assert_eq!(ids.len(), 40);
    assert_eq!(registry.size().unwrap(), 40);
}

#[test]
fn test_concurrent_saves_to_one_id_never_tear() {
    let (dir, registry) = registry();
    let registry = Arc::new(registry);
    let saved = registry.save(literal("contended")).unwrap();
    let barrier = Arc::new(Barrier::new(5));

    let writers: Vec<_> = (0..4)
        .map(|t| {
            let registry = Arc::clone(&registry);
            let barrier = Arc::clone(&barrier);
            let base = saved.clone();
            thread::spawn(move || {
                barrier.wait();
                for i in 0..20 {
                    let description = format!("writer {} round {} {}", t, i, "x".repeat(t * 500));
                    registry.save(base.clone().with_description(description)).unwrap();
                }
            })
        })
        .collect();

    let reader = {
        let registry = Arc::clone(&registry);
        let barrier = Arc::clone(&barrier);
        let id = saved.id;
        thread::spawn(move || {
            barrier.wait();
            for _ in 0..100 {
                let found = registry.find_service_by_id(id).unwrap().unwrap();
                assert_eq!(found.name, "contended");
                assert!(registry.load().unwrap().is_complete());
            }
        })
    };

    for writer in writers {
        writer.join().unwrap();
    }
    reader.join().unwrap();

    let found = registry.find_service_by_id(saved.id).unwrap().unwrap();
    assert!(found.description.unwrap().contains("round 19"));

    let documents = fs::read_dir(dir.path())
        .unwrap()
        .filter(|e| {
            !e.as_ref()
                .unwrap()
                .file_name()
                .to_string_lossy()
                .starts_with('.')
        })
        .count();
    assert_eq!(documents, 1);
}
