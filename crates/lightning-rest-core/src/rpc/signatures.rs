//! Known parameter names of the daemon RPC methods the gateway forwards to.
//!
//! Used at startup to check that no endpoint forwards a parameter the target
//! method does not accept.

/// The named parameters a daemon method accepts.
#[derive(Debug, Clone, Copy)]
pub struct MethodSignature {
    pub name: &'static str,
    pub params: &'static [&'static str],
}

impl MethodSignature {
    pub fn accepts(&self, param: &str) -> bool {
        self.params.contains(&param)
    }
}

const fn sig(name: &'static str, params: &'static [&'static str]) -> MethodSignature {
    MethodSignature { name, params }
}

/// Signatures of the lightningd commands reachable through the gateway.
pub static SIGNATURES: &[MethodSignature] = &[
    sig("getinfo", &[]),
    sig("connect", &["id", "host", "port"]),
    sig("listnodes", &["id"]),
    sig("listchannels", &["short_channel_id", "source"]),
    sig("listpeers", &["id", "level"]),
    sig("listfunds", &[]),
    sig(
        "getroute",
        &[
            "id",
            "msatoshi",
            "riskfactor",
            "cltv",
            "fromid",
            "fuzzpercent",
            "exclude",
            "maxhops",
        ],
    ),
    sig("listinvoices", &["label"]),
    sig(
        "invoice",
        &["msatoshi", "label", "description", "expiry", "fallbacks", "preimage"],
    ),
    sig("delinvoice", &["label", "status"]),
    sig("listpayments", &["bolt11", "payment_hash"]),
    sig("decodepay", &["bolt11", "description"]),
    sig(
        "pay",
        &[
            "bolt11",
            "msatoshi",
            "label",
            "riskfactor",
            "maxfeepercent",
            "retry_for",
            "maxdelay",
            "exemptfee",
            "description",
        ],
    ),
    sig("newaddr", &["addrtype"]),
    sig("dev-blockheight", &[]),
    sig("dev-setfees", &["immediate", "normal", "slow"]),
];

/// Look up a method by its RPC name.
pub fn lookup(name: &str) -> Option<&'static MethodSignature> {
    SIGNATURES.iter().find(|s| s.name == name)
}
