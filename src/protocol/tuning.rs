//! Tuning negotiation.
//!
//! Frame and channel limits are capacity ceilings, so the smaller value wins
//! and 0 on the client side means "no preference". Heartbeat 0 means
//! "disabled" on either side and always wins.

use serde::Serialize;

use crate::codec::Tune;

/// Result of merging client preferences with the server's Tune proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NegotiatedParameters {
    /// Heartbeat interval in seconds; 0 = heartbeats disabled
    pub heartbeat: u16,
    /// Maximum frame size in bytes; 0 = unlimited
    pub frame_max: u32,
    /// Maximum channel number; 0 = unlimited
    pub channel_max: u16,
}

impl NegotiatedParameters {
    /// Merge the client's preferences with a server proposal.
    pub fn negotiate(client: &Tune, server: &Tune) -> Self {
        Self {
            heartbeat: negotiate_heartbeat(client.heartbeat, server.heartbeat),
            frame_max: negotiate_limit(client.frame_max, server.frame_max),
            channel_max: negotiate_limit(client.channel_max, server.channel_max),
        }
    }

    /// The Tune-Ok arguments announcing these values.
    pub fn to_tune_ok(&self) -> Tune {
        Tune {
            channel_max: self.channel_max,
            frame_max: self.frame_max,
            heartbeat: self.heartbeat,
        }
    }
}

/// 0 if either side disables heartbeats, otherwise the shorter interval.
pub fn negotiate_heartbeat(client: u16, server: u16) -> u16 {
    if client == 0 || server == 0 {
        0
    } else {
        client.min(server)
    }
}

/// The server's value if the client has no preference, otherwise the smaller.
pub fn negotiate_limit<T: Ord + Copy + Default>(client: T, server: T) -> T {
    if client == T::default() {
        server
    } else {
        client.min(server)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn tune(heartbeat: u16, frame_max: u32, channel_max: u16) -> Tune {
        Tune {
            channel_max,
            frame_max,
            heartbeat,
        }
    }

    #[test]
    fn test_server_tightens_limits() {
        let negotiated =
            NegotiatedParameters::negotiate(&tune(60, 131072, 0), &tune(30, 4096, 2047));
        assert_eq!(
            negotiated,
            NegotiatedParameters {
                heartbeat: 30,
                frame_max: 4096,
                channel_max: 2047,
            }
        );
        assert_eq!(negotiated.to_tune_ok(), tune(30, 4096, 2047));
    }

    #[test]
    fn test_client_disables_heartbeat() {
        let negotiated = NegotiatedParameters::negotiate(&tune(0, 0, 0), &tune(60, 131072, 2047));
        assert_eq!(negotiated.heartbeat, 0);
        assert_eq!(negotiated.frame_max, 131072);
        assert_eq!(negotiated.channel_max, 2047);
    }

    #[test]
    fn test_server_disables_heartbeat() {
        assert_eq!(negotiate_heartbeat(60, 0), 0);
    }

    proptest! {
        #[test]
        fn heartbeat_zero_wins(c in any::<u16>(), s in any::<u16>()) {
            let n = negotiate_heartbeat(c, s);
            if c == 0 || s == 0 {
                prop_assert_eq!(n, 0);
            } else {
                prop_assert_eq!(n, c.min(s));
            }
        }

        #[test]
        fn limit_never_exceeds_client_preference(c in any::<u32>(), s in any::<u32>()) {
            let n = negotiate_limit(c, s);
            if c == 0 {
                prop_assert_eq!(n, s);
            } else {
                prop_assert_eq!(n, c.min(s));
                prop_assert!(n <= c);
            }
        }

        #[test]
        fn negotiate_is_field_wise(
            ch in any::<u16>(), cf in any::<u32>(), cc in any::<u16>(),
            sh in any::<u16>(), sf in any::<u32>(), sc in any::<u16>(),
        ) {
            let n = NegotiatedParameters::negotiate(&tune(ch, cf, cc), &tune(sh, sf, sc));
            prop_assert_eq!(n.heartbeat, negotiate_heartbeat(ch, sh));
            prop_assert_eq!(n.frame_max, negotiate_limit(cf, sf));
            prop_assert_eq!(n.channel_max, negotiate_limit(cc, sc));
        }
    }
}
