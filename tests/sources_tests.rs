use tempfile::TempDir;
use zonesweep::sources::{
    find_root_zone_file, parse_domain_list, parse_public_suffix_list, tlds_from_root_zone,
};

#[test]
fn test_psl_keeps_only_plain_suffixes() {
    let fixture = "// comment\n\n*.example.com\n!exclude.example.com\ngood.example.com\n";
    assert_eq!(parse_public_suffix_list(fixture), vec!["good.example.com"]);
}

#[test]
fn test_psl_real_layout() {
    let fixture = "\
// ===BEGIN ICANN DOMAINS===

// ac : https://en.wikipedia.org/wiki/.ac
ac
com.ac
edu.ac

// bd : https://en.wikipedia.org/wiki/.bd
*.bd

// jp
kawasaki.jp
*.kawasaki.jp
!city.kawasaki.jp

// Unicode entries are left out
公司.cn

// ===BEGIN PRIVATE DOMAINS===
blogspot.com   // trailing comment
";
    assert_eq!(
        parse_public_suffix_list(fixture),
        vec!["com.ac", "edu.ac", "kawasaki.jp", "blogspot.com"]
    );
}

#[test]
fn test_domain_list_normalization() {
    let text = "\
# targets
https://www.example.com/login
example.org.

HTTP://Sub.Example.NET
www.example.io
";
    assert_eq!(
        parse_domain_list(text),
        vec!["example.com", "example.org", "sub.example.net", "example.io"]
    );
}

#[test]
fn test_root_dump_ignores_apex_and_dnssec_lines() {
    let dump = "\
. 86400 a.root-servers.net. nstld.verisign-grs.com. 2024010100 1800 900 604800 86400
. 518400 a.root-servers.net.
. 86400 aaa. NS SOA RRSIG NSEC DNSKEY
net 172800 a.gtld-servers.net.
net 86400 35886 8 2 7862B27F5F516EBE19680444D4CE5E762981931842C465F00236401D8BD973EE
net 86400 DS 8 1 86400 20240114050000 20240101040000 30903 . aGVsbG8=
net 86400 network. NS DS RRSIG NSEC
aaa 172800 ns1.dns.nic.aaa.
";
    assert_eq!(tlds_from_root_zone(dump), vec!["aaa", "net"]);
}

#[tokio::test]
async fn test_find_root_zone_file_picks_first_server() {
    let dir = TempDir::new().unwrap();
    assert!(find_root_zone_file(dir.path()).await.is_none());

    std::fs::write(dir.path().join("k.root-servers.net.txt"), "").unwrap();
    std::fs::write(dir.path().join("f.root-servers.net.txt"), "").unwrap();
    std::fs::write(dir.path().join("f.root-servers.net.txt.temp"), "").unwrap();

    assert_eq!(
        find_root_zone_file(dir.path()).await,
        Some(dir.path().join("f.root-servers.net.txt"))
    );
    assert!(find_root_zone_file(&dir.path().join("absent")).await.is_none());
}
