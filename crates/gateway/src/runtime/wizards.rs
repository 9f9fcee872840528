//! Built-in wizard kinds: router port forwards and traffic rules, DNS filter
//! settings, and network diagnostics.

use super::wizard::{StepSpec, Validator, WizardRegistry, WizardSpec};

const PROTOCOLS: [&str; 3] = ["tcp", "udp", "tcp udp"];
const TARGETS: [&str; 3] = ["ACCEPT", "DROP", "REJECT"];

pub fn builtin() -> WizardRegistry {
    let mut reg = WizardRegistry::new();
    for spec in router_wizards()
        .into_iter()
        .chain(dns_wizards())
        .chain(network_wizards())
    {
        reg.register(spec);
    }
    reg
}

fn router_wizards() -> Vec<WizardSpec> {
    vec![
        WizardSpec::new(
            "port-forward",
            "Port forward",
            vec![
                StepSpec::new("name", "Rule name (letters, digits, underscores):", Validator::Identifier),
                StepSpec::new("ext_port", "External port (src dport):", Validator::Port),
                StepSpec::new("int_ip", "Internal IP (dest ip):", Validator::Ipv4),
                StepSpec::new("int_port", "Internal port (dest port):", Validator::Port),
                StepSpec::new("proto", "Protocol:", Validator::one_of(PROTOCOLS)),
            ],
        ),
        WizardSpec::new(
            "firewall-rule",
            "Traffic rule",
            vec![
                StepSpec::new("name", "Rule name (letters, digits, underscores):", Validator::Identifier),
                StepSpec::new("src", "Source zone (e.g. wan):", Validator::Identifier),
                StepSpec::new("dest", "Destination zone (e.g. lan):", Validator::Identifier),
                StepSpec::new(
                    "dest_port",
                    "Destination port (`any` for all ports):",
                    Validator::PortOrAny,
                ),
                StepSpec::new("target", "Action:", Validator::one_of(TARGETS)),
            ],
        ),
    ]
}

fn dns_wizards() -> Vec<WizardSpec> {
    vec![
        WizardSpec::new(
            "dns-upstreams",
            "DNS upstreams",
            vec![StepSpec::new(
                "upstreams",
                "Send the upstream servers, one per line (replaces the current list):",
                Validator::List,
            )],
        ),
        WizardSpec::new(
            "dns-bootstrap",
            "DNS bootstrap servers",
            vec![StepSpec::new(
                "bootstrap",
                "Send the bootstrap servers, one per line:",
                Validator::List,
            )],
        ),
        WizardSpec::new(
            "dns-ratelimit",
            "DNS rate limit",
            vec![StepSpec::new(
                "ratelimit",
                "Requests per second per client (0 disables the limit):",
                Validator::Numeric,
            )],
        ),
        WizardSpec::new(
            "dns-cache",
            "DNS cache size",
            vec![StepSpec::new("cache_mb", "Cache size in MB:", Validator::Numeric)],
        ),
        WizardSpec::new(
            "dns-rule",
            "DNS filtering rule",
            vec![StepSpec::new(
                "rule",
                "Send a filtering rule (e.g. `||ads.example.com^`). An existing rule is removed, a new one is added:",
                Validator::FreeForm,
            )],
        ),
        WizardSpec::new(
            "dns-filter-add",
            "Add blocklist",
            vec![
                StepSpec::new("name", "Blocklist name:", Validator::FreeForm),
                StepSpec::new("url", "Blocklist URL:", Validator::Url),
            ],
        ),
        WizardSpec::new(
            "dns-filter-remove",
            "Remove blocklist",
            vec![StepSpec::new("url", "URL of the blocklist to remove:", Validator::Url)],
        ),
    ]
}

fn network_wizards() -> Vec<WizardSpec> {
    let host_check = |kind: &str, title: &str| {
        WizardSpec::new(
            kind,
            title,
            vec![StepSpec::new("target", "Target host or IP:", Validator::Host)],
        )
    };
    vec![
        host_check("net-ping", "Ping"),
        host_check("net-trace", "Traceroute"),
        host_check("net-lookup", "DNS lookup"),
        WizardSpec::new(
            "net-curl",
            "HTTP check",
            vec![StepSpec::new("target", "URL to fetch:", Validator::Url)],
        ),
    ]
}
