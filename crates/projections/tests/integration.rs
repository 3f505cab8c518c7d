//! Integration tests: aggregates saved through repositories → ProjectionProcessor
//! → views and the campaign deletion cascade.

use chrono::{DateTime, Duration, TimeZone, Utc};
use common::{AggregateId, DomainId, MessageId, SubdomainId};
use domain::{
    AggregateRoot, Campaign, DeletionReason, Email, ReceivedEmail, Repository, derive_campaign_id,
};
use event_store::InMemoryEventStore;
use projections::{
    CampaignDeletionCascade, CampaignsView, EmailsView, Projection, ProjectionProcessor,
};

fn t(secs: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap() + Duration::seconds(secs)
}

struct Fixture {
    store: InMemoryEventStore,
    processor: ProjectionProcessor<InMemoryEventStore>,
    campaigns_view: CampaignsView,
    emails_view: EmailsView,
    cascade: CampaignDeletionCascade<InMemoryEventStore>,
    emails: Repository<InMemoryEventStore, Email>,
    campaigns: Repository<InMemoryEventStore, Campaign>,
}

fn setup() -> Fixture {
    let store = InMemoryEventStore::new();
    let campaigns_view = CampaignsView::new();
    let emails_view = EmailsView::new();
    let cascade = CampaignDeletionCascade::new(store.clone(), emails_view.clone());

    let mut processor = ProjectionProcessor::new(store.clone());
    processor.register(Box::new(campaigns_view.clone()));
    processor.register(Box::new(emails_view.clone()));
    processor.register(Box::new(cascade.clone()));

    Fixture {
        emails: Repository::new(store.clone()),
        campaigns: Repository::new(store.clone()),
        store,
        processor,
        campaigns_view,
        emails_view,
        cascade,
    }
}

/// Receives one email tagged with the campaign and records its capture.
async fn capture(
    fx: &Fixture,
    subdomain: SubdomainId,
    value: &str,
    at: DateTime<Utc>,
) -> MessageId {
    let campaign_id = derive_campaign_id(subdomain, value);
    let message_id = MessageId::new();
    let domain_id = DomainId::new();

    let mut email : AggregateRoot<Email> = AggregateRoot::new();
    email.raise_all(Email::receive(ReceivedEmail {
        message_id,
        domain_id,
        subdomain_id: subdomain,
        sender: "promo@shop.example".into(),
        recipients: vec!["inbox@qa.mail.example".into()],
        subject: "Offer".into(),
        size_bytes: 1024,
        campaign_id: Some(campaign_id),
        received_at: at,
    }));
    fx.emails.save(&mut email).await.unwrap();

    match fx.campaigns.load(campaign_id).await.unwrap() {
        Some(mut campaign) => {
            campaign.execute(|c| c.record_capture(message_id, at)).unwrap();
            fx.campaigns.save(&mut campaign).await.unwrap();
        }
        None => {
            let mut campaign : AggregateRoot<Campaign> = AggregateRoot::new();
            campaign.raise_all(
                Campaign::create(campaign_id, domain_id, subdomain, value.into(), message_id, at)
                    .unwrap(),
            );
            fx.campaigns.save(&mut campaign).await.unwrap();
        }
    }
    message_id
}

async fn delete_campaign(fx: &Fixture, campaign_id: AggregateId, force: bool) {
    let mut campaign = fx.campaigns.get(campaign_id).await.unwrap();
    campaign.execute(|c| c.delete(t(600), force)).unwrap();
    fx.campaigns.save(&mut campaign).await.unwrap();
}

#[tokio::test]
async fn deleting_campaign_cascades_to_its_emails() {
    let fx = setup();
    let subdomain = SubdomainId::new();
    let campaign_id = derive_campaign_id(subdomain, "promo3");

    let m1 = capture(&fx, subdomain, "promo3", t(0)).await;
    let m2 = capture(&fx, subdomain, "promo3", t(10)).await;
    let other = capture(&fx, subdomain, "unrelated", t(20)).await;
    fx.processor.settle().await.unwrap();

    let summary = fx.campaigns_view.get(campaign_id).await.unwrap();
    assert_eq!(summary.message_ids, vec![m1, m2]);
    assert_eq!(fx.emails_view.live_for_campaign(campaign_id).await.len(), 2);

    delete_campaign(&fx, campaign_id, false).await;
    fx.processor.settle().await.unwrap();

    assert!(fx.campaigns_view.get(campaign_id).await.unwrap().is_deleted());
    assert!(fx.emails_view.live_for_campaign(campaign_id).await.is_empty());
    for message_id in [m1, m2] {
        let email = fx.emails_view.get_email(message_id).await.unwrap();
        assert_eq!(
            email.deletion_reason,
            Some(DeletionReason::CampaignDeleted {
                campaign_id,
                force: false
            })
        );
        assert_eq!(email.deleted_at, Some(t(600)));
    }
    assert!(!fx.emails_view.get_email(other).await.unwrap().is_deleted());
}

#[tokio::test]
async fn cascade_skips_emails_deleted_by_the_user() {
    let fx = setup();
    let subdomain = SubdomainId::new();
    let campaign_id = derive_campaign_id(subdomain, "promo4");

    let kept_by_user = capture(&fx, subdomain, "promo4", t(0)).await;
    let cascaded = capture(&fx, subdomain, "promo4", t(5)).await;

    let mut email = fx.emails.get(kept_by_user.into()).await.unwrap();
    email
        .execute(|e| e.delete(t(30), DeletionReason::User))
        .unwrap();
    fx.emails.save(&mut email).await.unwrap();

    delete_campaign(&fx, campaign_id, true).await;
    fx.processor.settle().await.unwrap();

    let user_deleted = fx.emails.get(kept_by_user.into()).await.unwrap();
    assert_eq!(user_deleted.deletion_reason(), Some(DeletionReason::User));
    let cascade_deleted = fx.emails.get(cascaded.into()).await.unwrap();
    assert_eq!(
        cascade_deleted.deletion_reason(),
        Some(DeletionReason::CampaignDeleted {
            campaign_id,
            force: true
        })
    );
}

#[tokio::test]
async fn redelivered_deletion_writes_nothing_new() {
    let fx = setup();
    let subdomain = SubdomainId::new();
    let campaign_id = derive_campaign_id(subdomain, "promo5");

    capture(&fx, subdomain, "promo5", t(0)).await;
    delete_campaign(&fx, campaign_id, false).await;
    fx.processor.settle().await.unwrap();
    let events_after_first_pass = fx.store.event_count().await;

    // Simulate a restart that lost the cascade's position.
    fx.cascade.reset().await.unwrap();
    fx.processor.settle().await.unwrap();

    assert_eq!(fx.store.event_count().await, events_after_first_pass);
    assert_eq!(fx.cascade.position().await.events_processed, events_after_first_pass as u64);
}

#[tokio::test]
async fn rebuild_reproduces_the_same_views() {
    let fx = setup();
    let subdomain = SubdomainId::new();
    let campaign_id = derive_campaign_id(subdomain, "promo6");

    capture(&fx, subdomain, "promo6", t(0)).await;
    capture(&fx, subdomain, "promo6", t(1)).await;
    fx.processor.settle().await.unwrap();
    let before = fx.campaigns_view.get(campaign_id).await.unwrap();

    fx.processor.rebuild_all().await.unwrap();

    assert_eq!(fx.campaigns_view.get(campaign_id).await.unwrap(), before);
    assert_eq!(fx.emails_view.len().await, 2);
}
