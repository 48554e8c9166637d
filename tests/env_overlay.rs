use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, UNIX_EPOCH};

use ipnet::{IpNet, Ipv4Net, Ipv6Net};
use lineage as lc;

#[derive(Debug, Hash, PartialEq, Eq)]
struct Port;

#[test]
fn test_three_level_overlay_resolves_nearest() {
    let root = lc::Env::new();
    root.set("level", "root");
    root.set(Port, 80u16);
    let mid = root.fork();
    mid.set("level", "mid");
    let leaf = mid.fork();

    assert_eq!(leaf.get_string("level").as_deref(), Some("mid"));
    assert_eq!(leaf.get_as::<u16, _>(Port), Some(80));
    assert_eq!(leaf.depth(), 2);

    leaf.set("level", "leaf");
    assert_eq!(leaf.get_string("level").as_deref(), Some("leaf"));
    assert_eq!(mid.get_string("level").as_deref(), Some("mid"));
    assert_eq!(root.get_string("level").as_deref(), Some("root"));
}

#[test]
fn test_parent_writes_after_fork_are_visible() {
    let root = lc::Env::new();
    let child = root.fork();
    assert!(!child.has("late"));
    root.set("late", true);
    assert_eq!(child.get_bool("late"), Some(true));
}

#[test]
fn test_typed_getters_are_soft_misses() {
    let env = lc::Env::new();
    env.set("n", 7i64);
    env.set("addr", SocketAddr::from(([127, 0, 0, 1], 8080)));
    env.set("ip", Ipv4Addr::LOCALHOST);
    env.set("t", UNIX_EPOCH + Duration::from_secs(10));
    env.set("d", Duration::from_millis(250));

    assert_eq!(env.get_i64("n"), Some(7));
    assert_eq!(env.get_i32("n"), None, "no numeric widening");
    assert_eq!(env.get_string("n"), None);
    assert_eq!(env.get_i64("missing"), None);
    assert_eq!(
        env.get_socket_addr("addr"),
        Some(SocketAddr::from(([127, 0, 0, 1], 8080)))
    );
    assert_eq!(env.get_ip_addr("ip"), Some(IpAddr::V4(Ipv4Addr::LOCALHOST)));
    assert_eq!(
        env.get_system_time("t"),
        Some(UNIX_EPOCH + Duration::from_secs(10))
    );
    assert_eq!(env.get_duration("d"), Some(Duration::from_millis(250)));
}

#[test]
fn test_keys_are_typed() {
    let env = lc::Env::new();
    env.set(Port, 1u16);
    env.set("Port", 2u16);
    assert_eq!(env.get_as::<u16, _>(Port), Some(1));
    assert_eq!(env.get_as::<u16, _>("Port"), Some(2));
    assert_eq!(env.keys().len(), 2);
}

#[test]
fn test_concurrent_reads_and_writes_across_levels() {
    let root = lc::Env::new();
    root.set("shared", 0usize);
    let children: Vec<lc::Env> = (0..4).map(|_| root.fork()).collect();
    let root = Arc::new(root);

    let mut handles = Vec::new();
    for (i, child) in children.into_iter().enumerate() {
        handles.push(thread::spawn(move || {
            for j in 0..200usize {
                child.set("mine", i * 1000 + j);
                assert_eq!(child.get_usize("mine"), Some(i * 1000 + j));
                assert!(child.get_usize("shared").is_some());
            }
        }));
    }
    let writer = Arc::clone(&root);
    handles.push(thread::spawn(move || {
        for j in 0..200usize {
            writer.set("shared", j);
        }
    }));
    for h in handles {
        h.join().expect("env thread");
    }
    assert_eq!(root.get_usize("shared"), Some(199));
    assert!(!root.has("mine"));
}

#[test]
fn test_ip_net_getter_accepts_each_family() {
    let root = lc::Env::new();
    let v4: Ipv4Net = "10.0.0.0/8".parse().expect("v4 net");
    let v6: Ipv6Net = "fd00::/64".parse().expect("v6 net");
    let any: IpNet = "192.168.1.0/24".parse().expect("net");
    root.set("v4", v4);
    root.set("v6", v6);
    root.set("any", any);
    root.set("addr", Ipv4Addr::LOCALHOST);
    root.set("text", "10.0.0.0/8");
    let child = root.fork();

    assert_eq!(child.get_ip_net("v4"), Some(IpNet::V4(v4)));
    assert_eq!(child.get_ip_net("v6"), Some(IpNet::V6(v6)));
    assert_eq!(child.get_ip_net("any"), Some(any));
    assert_eq!(child.get_ip_net("addr"), None, "an address is not a prefix");
    assert_eq!(child.get_ip_net("text"), None, "strings are not parsed");
    assert_eq!(child.get_ip_net("missing"), None);
    assert_eq!(
        child.get_ip_net("v4").map(|n| n.prefix_len()),
        Some(8)
    );
}
