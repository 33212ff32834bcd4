//! Async glue that runs a controller over a [`Transport`].

use hap_core::error::Result;
use hap_crypto::SessionKeys;
use tracing::debug;

use crate::pair_verify::{VerifyController, VerifyStep};
use crate::traits::Transport;

/// Run pair-verify to completion, one round trip at a time.
pub async fn run_pair_verify<T>(
    mut controller: VerifyController,
    transport: &mut T,
) -> Result<SessionKeys>
where
    T: Transport + ?Sized,
{
    let mut request = controller.start_request()?.encode();

    loop {
        let response = transport.pair_verify(&request).await?;
        debug!(
            request_len = request.len(),
            response_len = response.len(),
            "pair-verify round trip"
        );

        match controller.handle_bytes(&response)? {
            VerifyStep::Send(next) => request = next.encode(),
            VerifyStep::Complete(keys) => return Ok(keys),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::ControllerIdentity;
    use crate::mock_accessory::MockAccessory;
    use crate::traits::MockTransport;
    use hap_core::error::{Error, PairingError};

    fn serve(accessory: MockAccessory) -> MockTransport {
        let mut accessory = accessory;
        let mut mock = MockTransport::new();
        mock.expect_pair_verify()
            .times(2)
            .returning(move |request| Box::pin({
                let resp = accessory.respond(request);
                async move { resp }
            }));
        mock
    }

    #[tokio::test]
    async fn completes_against_accessory() {
        let accessory = MockAccessory::new("AA:BB:CC:DD:EE:FF");
        let controller = VerifyController::new(ControllerIdentity::generate(), accessory.accessory_key());
        let mut transport = serve(accessory);

        let keys = run_pair_verify(controller, &mut transport).await.unwrap();
        assert_ne!(keys.write_key.as_bytes(), keys.read_key.as_bytes());
    }

    #[tokio::test]
    async fn rejection_surfaces_as_pairing_error() {
        let mut accessory = MockAccessory::new("AA:BB:CC:DD:EE:FF");
        accessory.finish_status = Some(0x02);
        let controller = VerifyController::new(ControllerIdentity::generate(), accessory.accessory_key());
        let mut transport = serve(accessory);

        let result = run_pair_verify(controller, &mut transport).await;
        assert!(matches!(
            result,
            Err(Error::Pairing(PairingError::PeerRejected { code: 0x02 }))
        ));
    }

    #[tokio::test]
    async fn forged_accessory_stops_after_first_round_trip() {
        let accessory = MockAccessory::new("AA:BB:CC:DD:EE:FF");
        let impostor = MockAccessory::new("AA:BB:CC:DD:EE:FF");
        let controller = VerifyController::new(ControllerIdentity::generate(), accessory.accessory_key());

        let mut impostor = impostor;
        let mut transport = MockTransport::new();
        transport
            .expect_pair_verify()
            .times(1)
            .returning(move |request| Box::pin({
                let resp = impostor.respond(request);
                async move { resp }
            }));

        let result = run_pair_verify(controller, &mut transport).await;
        assert!(matches!(
            result,
            Err(Error::Pairing(PairingError::Authentication(_)))
        ));
    }

    #[tokio::test]
    async fn transport_failure_is_propagated() {
        let accessory = MockAccessory::new("AA:BB:CC:DD:EE:FF");
        let controller = VerifyController::new(ControllerIdentity::generate(), accessory.accessory_key());

        let mut transport = MockTransport::new();
        transport.expect_pair_verify().times(1).returning(|_| {
            Box::pin(async { Err(Error::Transport("connection reset".to_string())) })
        });

        let result = run_pair_verify(controller, &mut transport).await;
        assert!(matches!(result, Err(Error::Transport(_))));
    }
}
