use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free counters updated from any ingest/send worker thread. Read with
/// [`Stats::snapshot`], which takes a consistent-enough, not transactional,
/// point-in-time copy.
#[derive(Debug, Default)]
pub struct Stats {
    pub snmp_queries: AtomicU64,
    pub icmp_replies: AtomicU64,
    pub arp_replies: AtomicU64,
    pub dhcp_discovers: AtomicU64,
    pub dhcp_offers: AtomicU64,
    pub dhcp_requests: AtomicU64,
    pub dhcp_acks: AtomicU64,
    pub dhcp_naks: AtomicU64,
    pub ftp_sessions: AtomicU64,
    pub neighbor_advertisements_sent: AtomicU64,
    pub neighbor_advertisements_received: AtomicU64,
    pub generic_udp_hits: AtomicU64,
    pub generic_tcp_hits: AtomicU64,
    pub ser_errors: AtomicU64,
    pub send_drops: AtomicU64,
    pub handler_panics: AtomicU64,
    pub malformed_drops: AtomicU64,
    pub auth_failures: AtomicU64,
}

macro_rules! counter_accessors {
    ($($field:ident => $incr:ident),* $(,)?) => {
        $(
            pub fn $incr(&self) {
                self.$field.fetch_add(1, Ordering::Relaxed);
            }
        )*
    };
}

impl Stats {
    counter_accessors! {
        snmp_queries => incr_snmp_queries,
        icmp_replies => incr_icmp_replies,
        arp_replies => incr_arp_replies,
        dhcp_discovers => incr_dhcp_discovers,
        dhcp_offers => incr_dhcp_offers,
        dhcp_requests => incr_dhcp_requests,
        dhcp_acks => incr_dhcp_acks,
        dhcp_naks => incr_dhcp_naks,
        ftp_sessions => incr_ftp_sessions,
        neighbor_advertisements_sent => incr_neighbor_advertisements_sent,
        neighbor_advertisements_received => incr_neighbor_advertisements_received,
        generic_udp_hits => incr_generic_udp_hits,
        generic_tcp_hits => incr_generic_tcp_hits,
        ser_errors => incr_ser_errors,
        send_drops => incr_send_drops,
        handler_panics => incr_handler_panics,
        malformed_drops => incr_malformed_drops,
        auth_failures => incr_auth_failures,
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            snmp_queries: self.snmp_queries.load(Ordering::Relaxed),
            icmp_replies: self.icmp_replies.load(Ordering::Relaxed),
            arp_replies: self.arp_replies.load(Ordering::Relaxed),
            dhcp_discovers: self.dhcp_discovers.load(Ordering::Relaxed),
            dhcp_offers: self.dhcp_offers.load(Ordering::Relaxed),
            dhcp_requests: self.dhcp_requests.load(Ordering::Relaxed),
            dhcp_acks: self.dhcp_acks.load(Ordering::Relaxed),
            dhcp_naks: self.dhcp_naks.load(Ordering::Relaxed),
            ftp_sessions: self.ftp_sessions.load(Ordering::Relaxed),
            neighbor_advertisements_sent: self.neighbor_advertisements_sent.load(Ordering::Relaxed),
            neighbor_advertisements_received: self
                .neighbor_advertisements_received
                .load(Ordering::Relaxed),
            generic_udp_hits: self.generic_udp_hits.load(Ordering::Relaxed),
            generic_tcp_hits: self.generic_tcp_hits.load(Ordering::Relaxed),
            ser_errors: self.ser_errors.load(Ordering::Relaxed),
            send_drops: self.send_drops.load(Ordering::Relaxed),
            handler_panics: self.handler_panics.load(Ordering::Relaxed),
            malformed_drops: self.malformed_drops.load(Ordering::Relaxed),
            auth_failures: self.auth_failures.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time, owned copy of [`Stats`] suitable for returning from
/// `GetStats` without exposing the atomics themselves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub snmp_queries: u64,
    pub icmp_replies: u64,
    pub arp_replies: u64,
    pub dhcp_discovers: u64,
    pub dhcp_offers: u64,
    pub dhcp_requests: u64,
    pub dhcp_acks: u64,
    pub dhcp_naks: u64,
    pub ftp_sessions: u64,
    pub neighbor_advertisements_sent: u64,
    pub neighbor_advertisements_received: u64,
    pub generic_udp_hits: u64,
    pub generic_tcp_hits: u64,
    pub ser_errors: u64,
    pub send_drops: u64,
    pub handler_panics: u64,
    pub malformed_drops: u64,
    pub auth_failures: u64,
}
