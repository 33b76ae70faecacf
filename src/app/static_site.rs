//! Default application: serve the configured root, no endpoints.

use crate::app::{Application, HookContext, Properties};
use crate::config::AppConfig;
use crate::session::SessionError;

/// Accepts every peer and configures its index from [`AppConfig`].
#[derive(Debug, Clone, Default)]
pub struct StaticSite {
    config: AppConfig,
}

impl StaticSite {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }
}

impl Application for StaticSite {
    fn on_connection(
        &self,
        cx: &mut HookContext<'_>,
        _parameters: &Properties,
    ) -> Result<bool, SessionError> {
        let parameters = cx.peer_mut().parameters_mut();
        match &self.config.index {
            Some(index) => parameters.set_string("index", index.clone()),
            None => parameters.set_bool("index", self.config.directory_listing),
        }
        tracing::debug!(peer = %cx.peer().id(), path = %cx.peer().path, "Peer connected");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{Peer, Value};
    use crate::http::cookie::CookieJar;
    use crate::http::Outbox;

    fn connect(site: &StaticSite) -> Peer {
        let mut peer = Peer::new("127.0.0.1:1".parse().unwrap());
        let mut writer = Outbox::new();
        let jar = CookieJar::new();
        let mut cx = HookContext::new(&mut peer, None, &mut writer, &jar);
        assert!(site.on_connection(&mut cx, &Properties::new()).unwrap());
        peer
    }

    #[test]
    fn test_index_name_configured() {
        let site = StaticSite::new(AppConfig {
            index: Some("index.html".into()),
            ..AppConfig::default()
        });
        let peer = connect(&site);
        assert_eq!(
            peer.parameters().get("index"),
            Some(&Value::String("index.html".into()))
        );
    }

    #[test]
    fn test_listing_flag_without_index() {
        let site = StaticSite::new(AppConfig {
            index: None,
            directory_listing: false,
            ..AppConfig::default()
        });
        let peer = connect(&site);
        assert_eq!(peer.parameters().get_bool("index"), Some(false));
    }
}
