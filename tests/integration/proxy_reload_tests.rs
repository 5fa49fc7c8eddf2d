//! Proxy list reload, by command and by file watcher.

use std::sync::Arc;
use std::time::Duration;

use mc_herd::config::GlobalConfig;
use mc_herd::models::ProxyEndpoint;
use mc_herd::orchestrator::proxy_allocator::ProxyAllocator;
use mc_herd::persistence::proxies::ProxyWatcher;

use super::test_helpers::Harness;

#[tokio::test]
async fn reload_command_reads_the_configured_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("proxies.txt");
    std::fs::write(&path, "socks5://10.0.0.1:1080\nhttp://10.0.0.2:3128\n").expect("write");

    let mut config = GlobalConfig::default();
    config.proxies_path = path.clone();
    let harness = Harness::with(&["a"], &[], config);

    let count = harness.orchestrator.reload_proxies().expect("reload");
    assert_eq!(count, 2);
    assert_eq!(
        harness.orchestrator.allocator().assign(1),
        Some(ProxyEndpoint::new("http://10.0.0.2:3128"))
    );
}

#[tokio::test]
async fn reload_of_missing_file_clears_the_list() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut config = GlobalConfig::default();
    config.proxies_path = dir.path().join("absent.txt");
    let harness = Harness::with(&["a"], &["socks5://10.0.0.1:1080"], config);

    assert_eq!(harness.orchestrator.reload_proxies().expect("reload"), 0);
    assert!(harness.orchestrator.allocator().assign(0).is_none());
}

#[tokio::test]
async fn watcher_picks_up_file_changes() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("proxies.txt");
    std::fs::write(&path, "socks5://10.0.0.1:1080\n").expect("write");

    let allocator = Arc::new(ProxyAllocator::new(vec![ProxyEndpoint::new(
        "socks5://10.0.0.1:1080",
    )]));
    let _watcher = ProxyWatcher::spawn(path.clone(), Arc::clone(&allocator)).expect("watch");

    std::fs::write(&path, "socks5://10.0.0.7:1080\nsocks5://10.0.0.8:1080\n").expect("rewrite");

    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while allocator.len() != 2 {
        assert!(
            tokio::time::Instant::now() < deadline,
            "watcher did not reload the proxy list"
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert_eq!(
        allocator.assign(0),
        Some(ProxyEndpoint::new("socks5://10.0.0.7:1080"))
    );
}
