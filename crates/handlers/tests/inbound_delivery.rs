//! End-to-end delivery: handlers, projections and the deletion cascade
//! over one in-memory store.

use std::sync::Arc;

use common::{DomainId, MessageId, SubdomainId};
use domain::{DeletionReason, SystemClock, derive_campaign_id};
use event_store::InMemoryEventStore;
use handlers::{
    CampaignHandler, ChaosAddressHandler, CreateChaosAddress, DeleteCampaign, HandlerContext,
    InMemoryPublisher, InboundMailHandler, InboundMessage, KeyedLocks, RegisterSubdomain,
    ResolvedRecipient, SubdomainHandler,
};
use projections::{
    CampaignDeletionCascade, CampaignsView, ChaosAddressesView, EmailsView, ProjectionProcessor,
};
use tokio_util::sync::CancellationToken;

struct Fixture {
    store: InMemoryEventStore,
    publisher: InMemoryPublisher,
    processor: ProjectionProcessor<InMemoryEventStore>,
    chaos_view: ChaosAddressesView,
    campaigns_view: CampaignsView,
    emails_view: EmailsView,
    chaos: ChaosAddressHandler<InMemoryEventStore>,
    campaigns: Arc<CampaignHandler<InMemoryEventStore>>,
    subdomains: SubdomainHandler<InMemoryEventStore>,
    inbound: InboundMailHandler<InMemoryEventStore>,
    domain_id: DomainId,
    subdomain_id: SubdomainId,
    cancel: CancellationToken,
}

impl Fixture {
    async fn new() -> Self {
        let store = InMemoryEventStore::new();
        let publisher = InMemoryPublisher::new();
        let context = HandlerContext::new(
            store.clone(),
            Arc::new(SystemClock),
            Arc::new(publisher.clone()),
        );

        let chaos_view = ChaosAddressesView::new();
        let campaigns_view = CampaignsView::new();
        let emails_view = EmailsView::new();
        let mut processor = ProjectionProcessor::new(store.clone());
        processor.register(Box::new(chaos_view.clone()));
        processor.register(Box::new(campaigns_view.clone()));
        processor.register(Box::new(emails_view.clone()));
        processor.register(Box::new(CampaignDeletionCascade::new(
            store.clone(),
            emails_view.clone(),
        )));

        let campaigns = Arc::new(CampaignHandler::new(context.clone(), KeyedLocks::new()));
        let fixture = Self {
            chaos: ChaosAddressHandler::new(context.clone()),
            subdomains: SubdomainHandler::new(context.clone()),
            inbound: InboundMailHandler::new(context, chaos_view.clone(), Arc::clone(&campaigns)),
            campaigns,
            store,
            publisher,
            processor,
            chaos_view,
            campaigns_view,
            emails_view,
            domain_id: DomainId::new(),
            subdomain_id: SubdomainId::new(),
            cancel: CancellationToken::new(),
        };

        let registered = fixture
            .subdomains
            .register(
                RegisterSubdomain {
                    subdomain_id: fixture.subdomain_id,
                    domain_id: fixture.domain_id,
                    name: "qa".into(),
                },
                &fixture.cancel,
            )
            .await;
        assert!(registered.is_succeeded());
        fixture
    }

    fn message(&self, local_part: &str, headers: &[(&str, &str)]) -> InboundMessage {
        InboundMessage {
            message_id: MessageId::new(),
            sender: "sender@shop.example".into(),
            recipient: ResolvedRecipient {
                domain_id: self.domain_id,
                subdomain_id: self.subdomain_id,
                local_part: local_part.into(),
            },
            recipients: vec![format!("{local_part}@qa.mail.example")],
            subject: "Weekly offer".into(),
            headers: headers
                .iter()
                .map(|(n, v)| (n.to_string(), v.to_string()))
                .collect(),
            size_bytes: 2048,
        }
    }
}

#[tokio::test]
async fn plain_message_is_accepted_and_stored() {
    let fx = Fixture::new().await;
    let message = fx.message("inbox", &[]);
    let message_id = message.message_id;

    let reply = fx.inbound.deliver(message, &fx.cancel).await;
    assert_eq!(reply.code, 250);

    fx.processor.settle().await.unwrap();
    let email = fx.emails_view.get_email(message_id).await.unwrap();
    assert_eq!(email.campaign_id, None);
    assert_eq!(fx.publisher.published_names(), vec!["EmailReceived"]);
}

#[tokio::test]
async fn suspended_subdomain_refuses_mail() {
    let fx = Fixture::new().await;
    assert!(
        fx.subdomains
            .suspend(fx.subdomain_id, Some("abuse report".into()), &fx.cancel)
            .await
            .is_succeeded()
    );
    let events_before = fx.store.event_count().await;

    let reply = fx.inbound.deliver(fx.message("inbox", &[]), &fx.cancel).await;

    assert_eq!(reply.code, 550);
    assert_eq!(fx.store.event_count().await, events_before);
}

#[tokio::test]
async fn enabled_chaos_address_answers_with_its_code() {
    let fx = Fixture::new().await;
    let id = fx
        .chaos
        .create(
            CreateChaosAddress::new(fx.domain_id, fx.subdomain_id, "Bounce", 452),
            &fx.cancel,
        )
        .await
        .succeeded()
        .unwrap();
    fx.processor.settle().await.unwrap();

    // Disabled addresses take mail like any other mailbox.
    let reply = fx.inbound.deliver(fx.message("bounce", &[]), &fx.cancel).await;
    assert_eq!(reply.code, 250);

    assert!(fx.chaos.enable(id, &fx.cancel).await.is_succeeded());
    fx.processor.settle().await.unwrap();

    let reply = fx.inbound.deliver(fx.message("bounce", &[]), &fx.cancel).await;
    assert_eq!(reply.code, 452);
    assert!(!reply.is_accepted());

    fx.processor.settle().await.unwrap();
    let summary = fx.chaos_view.get(id).await.unwrap();
    assert_eq!(summary.received_count, 1);
    assert_eq!(fx.emails_view.inbox(fx.subdomain_id).await.len(), 1);
}

#[tokio::test]
async fn campaign_mail_is_captured_and_cascades_on_delete() {
    let fx = Fixture::new().await;
    let campaign_id = derive_campaign_id(fx.subdomain_id, "promo3");

    let first = fx.message("inbox", &[("X-Campaign-Id", "promo3")]);
    let second = fx.message("other", &[("x-campaign", "promo3")]);
    let ids = [first.message_id, second.message_id];
    for message in [first, second] {
        assert!(fx.inbound.deliver(message, &fx.cancel).await.is_accepted());
    }
    fx.processor.settle().await.unwrap();

    let summary = fx.campaigns_view.get(campaign_id).await.unwrap();
    assert_eq!(summary.message_ids, ids.to_vec());
    assert_eq!(summary.sample_message_id, ids[0]);
    assert_eq!(fx.emails_view.live_for_campaign(campaign_id).await.len(), 2);

    let delete = DeleteCampaign {
        campaign_id,
        force: false,
    };
    assert!(fx.campaigns.delete(delete, &fx.cancel).await.is_succeeded());
    fx.processor.settle().await.unwrap();

    assert!(fx.emails_view.live_for_campaign(campaign_id).await.is_empty());
    for id in ids {
        let email = fx.emails_view.get_email(id).await.unwrap();
        assert_eq!(
            email.deletion_reason,
            Some(DeletionReason::CampaignDeleted {
                campaign_id,
                force: false
            })
        );
    }
}

#[tokio::test]
async fn late_mail_for_deleted_campaign_is_accepted_then_deleted() {
    let fx = Fixture::new().await;
    let campaign_id = derive_campaign_id(fx.subdomain_id, "expired");

    let first = fx.message("inbox", &[("X-Campaign-Id", "expired")]);
    assert!(fx.inbound.deliver(first, &fx.cancel).await.is_accepted());
    let delete = DeleteCampaign {
        campaign_id,
        force: true,
    };
    assert!(fx.campaigns.delete(delete, &fx.cancel).await.is_succeeded());
    // The cascade finishes before the late message shows up.
    fx.processor.settle().await.unwrap();
    assert!(fx.emails_view.live_for_campaign(campaign_id).await.is_empty());

    let late = fx.message("inbox", &[("X-Campaign-Id", "expired")]);
    let late_id = late.message_id;
    let reply = fx.inbound.deliver(late, &fx.cancel).await;
    assert_eq!(reply.code, 250);

    fx.processor.settle().await.unwrap();
    assert!(fx.emails_view.live_for_campaign(campaign_id).await.is_empty());
    let email = fx.emails_view.get_email(late_id).await.unwrap();
    assert_eq!(email.campaign_id, Some(campaign_id));
    assert_eq!(
        email.deletion_reason,
        Some(DeletionReason::CampaignDeleted {
            campaign_id,
            force: true
        })
    );
    let summary = fx.campaigns_view.get(campaign_id).await.unwrap();
    assert!(!summary.message_ids.contains(&late_id));
}

#[tokio::test]
async fn late_mail_before_the_cascade_runs_is_deleted_once() {
    let fx = Fixture::new().await;
    let campaign_id = derive_campaign_id(fx.subdomain_id, "winding-down");

    let first = fx.message("inbox", &[("X-Campaign", "winding-down")]);
    assert!(fx.inbound.deliver(first, &fx.cancel).await.is_accepted());
    let delete = DeleteCampaign {
        campaign_id,
        force: false,
    };
    assert!(fx.campaigns.delete(delete, &fx.cancel).await.is_succeeded());

    let late = fx.message("inbox", &[("X-Campaign", "winding-down")]);
    assert!(fx.inbound.deliver(late, &fx.cancel).await.is_accepted());
    fx.processor.settle().await.unwrap();

    assert!(fx.emails_view.live_for_campaign(campaign_id).await.is_empty());
    assert_eq!(fx.emails_view.for_campaign(campaign_id).await.len(), 2);
    assert_eq!(fx.store.events_of_type("EmailDeleted").await.len(), 2);
}
