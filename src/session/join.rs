use tracing::info;

use crate::core::{Error, Result};
use super::{ChannelSpec, Credentials, JoinMode, Session};

/// Produces a joined-network session from credentials
pub trait Joiner: Send {
    fn join(&mut self, mode: JoinMode, credentials: &Credentials) -> Result<Session>;
}

/// Local ABP activation.
///
/// ABP needs no exchange with the network: the address and session keys are
/// provisioned, so the session is assembled directly. OTAA requests are
/// refused; those need a joiner that can reach a join server.
#[derive(Debug, Clone)]
pub struct AbpJoiner {
    channels: Vec<ChannelSpec>,
    data_rate_index: u8,
}

impl AbpJoiner {
    pub fn new(channels: Vec<ChannelSpec>, data_rate_index: u8) -> Self {
        AbpJoiner {
            channels,
            data_rate_index,
        }
    }
}

impl Joiner for AbpJoiner {
    fn join(&mut self, mode: JoinMode, credentials: &Credentials) -> Result<Session> {
        if credentials.mode() != mode {
            return Err(Error::join(format!(
                "{:?} join requested with {:?} credentials",
                mode,
                credentials.mode()
            )));
        }

        match credentials {
            Credentials::Abp { dev_addr, nwk_skey, app_skey } => {
                info!(dev_addr = %format!("{:08X}", dev_addr), "ABP session activated");
                Ok(Session {
                    dev_addr: *dev_addr,
                    nwk_skey: *nwk_skey,
                    app_skey: *app_skey,
                    channels: self.channels.clone(),
                    data_rate_index: self.data_rate_index,
                    uplink_counter: 0,
                })
            }
            Credentials::Otaa { .. } => Err(Error::join(
                "OTAA activation needs a network join server",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::single_frequency_plan;

    fn abp() -> Credentials {
        Credentials::Abp {
            dev_addr: 0x2601_160C,
            nwk_skey: [1; 16],
            app_skey: [2; 16],
        }
    }

    #[test]
    fn test_abp_join() {
        let mut joiner = AbpJoiner::new(single_frequency_plan(903_900_000, 8, 0, 3), 3);
        let session = joiner.join(JoinMode::Abp, &abp()).unwrap();
        assert_eq!(session.dev_addr, 0x2601_160C);
        assert_eq!(session.channels.len(), 8);
        assert_eq!(session.data_rate_index, 3);
        assert_eq!(session.uplink_counter, 0);
    }

    #[test]
    fn test_mode_mismatch() {
        let mut joiner = AbpJoiner::new(vec![], 3);
        let err = joiner.join(JoinMode::Otaa, &abp()).unwrap_err();
        assert!(matches!(err, Error::Join(_)));
    }

    #[test]
    fn test_otaa_refused() {
        let mut joiner = AbpJoiner::new(vec![], 3);
        let creds = Credentials::Otaa {
            dev_eui: [0; 8],
            app_eui: [0; 8],
            app_key: [0; 16],
        };
        assert!(joiner.join(JoinMode::Otaa, &creds).is_err());
    }
}
