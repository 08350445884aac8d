//! Click-to-load previews running alongside supervised embeds

use embedguard::controller::{Owner, Scope};
use embedguard::player::{Behavior, PlayerScript};
use embedguard::{
    ApiLoader, EmbedSettings, EmbedSupervisor, Markup, MemoryPage, Outcome, Page, Query,
    ScriptedPlayerFactory,
};
use std::sync::Arc;
use url::Url;

fn page_with(body: Vec<Markup>) -> Arc<MemoryPage> {
    Arc::new(MemoryPage::with_body(
        Url::parse("https://example.com/tour").unwrap(),
        body,
    ))
}

fn supervisor(page: &Arc<MemoryPage>, players: &Arc<ScriptedPlayerFactory>) -> EmbedSupervisor {
    let loader = Arc::new(ApiLoader::new(page.clone()));
    EmbedSupervisor::new(page.clone(), players.clone(), loader, EmbedSettings::default())
        .expect("supervisor")
}

fn lazy_container(video: &str) -> Markup {
    Markup::new("div").class("video-lazy").child(
        Markup::new("iframe")
            .class("js-video-embed")
            .attr("src", format!("https://www.youtube.com/embed/{video}")),
    )
}

#[tokio::test]
async fn lazy_embeds_are_not_supervised() {
    let page = page_with(vec![
        lazy_container("lazyVID01"),
        Markup::new("div").class("video-embed").child(
            Markup::new("iframe")
                .class("js-video-embed")
                .attr("src", "https://www.youtube.com/embed/eagerVID1"),
        ),
    ]);
    let players = Arc::new(ScriptedPlayerFactory::new(PlayerScript::new(
        Behavior::Ready { after_ms: 0 },
    )));
    let supervisor = supervisor(&page, &players);

    let run = supervisor.run_page().await;
    assert_eq!(run.previews.len(), 1);
    assert_eq!(run.controllers.len(), 1);

    let reports = EmbedSupervisor::collect(run.controllers).await;
    assert_eq!(reports[0].video_id.as_str(), "eagerVID1");
    assert_eq!(reports[0].outcome, Outcome::Ready);

    let attachments = players.attachments().await;
    assert_eq!(attachments.len(), 1);
    assert!(attachments[0].locator.contains("eagerVID1"));
}

#[tokio::test]
async fn activated_player_autoplays_and_stays_unclaimed_by_rescans() {
    let page = page_with(vec![lazy_container("lazyVID01")]);
    let players = Arc::new(ScriptedPlayerFactory::new(PlayerScript::default()));
    let supervisor = supervisor(&page, &players);

    let run = supervisor.run_page().await;
    assert!(run.controllers.is_empty());
    let preview = run.previews.into_iter().next().unwrap();
    let container = preview.container;

    assert!(page.click(preview.button).await);
    let player = preview.activated().await.expect("player inserted");

    let src = page.attribute(player, "src").await.unwrap();
    assert!(src.starts_with("https://www.youtube-nocookie.com/embed/lazyVID01?"));
    assert!(src.contains("autoplay=1"));
    assert!(!src.contains("enablejsapi"));

    let identity = page.attribute(player, "id").await.unwrap();
    assert!(identity.starts_with("lazy-"));
    assert_eq!(
        supervisor.claims().owner(player).await,
        Some(Owner::LazyPlayer)
    );

    // The new iframe is on a recognised host, but it already has an owner
    assert!(supervisor.supervise(Scope::PageWide).await.is_empty());
    assert!(supervisor.supervise(Scope::Trusted).await.is_empty());
    assert!(players.attachments().await.is_empty());
    assert!(page.scripts().await.is_empty());

    let snapshot = page.snapshot(container).await.unwrap();
    assert_eq!(snapshot.children.len(), 1);
    assert_eq!(snapshot.children[0].tag, "iframe");
}

#[tokio::test]
async fn preview_activates_only_once() {
    let page = page_with(vec![lazy_container("lazyVID01")]);
    let players = Arc::new(ScriptedPlayerFactory::new(PlayerScript::default()));
    let supervisor = supervisor(&page, &players);

    let preview = supervisor
        .lazy_reveal()
        .install()
        .await
        .into_iter()
        .next()
        .unwrap();
    let button = preview.button;
    let container = preview.container;

    assert!(page.click(button).await);
    preview.activated().await.expect("player inserted");
    assert!(!page.click(button).await);

    assert_eq!(
        page.find_all(&Query::tag("iframe").within(container)).await.len(),
        1
    );
}

#[tokio::test]
async fn ineligible_lazy_containers_fall_through_to_supervision() {
    // Two trusted embeds in one lazy container: no preview, both supervised
    let page = page_with(vec![Markup::new("div")
        .class("video-lazy")
        .child(
            Markup::new("iframe")
                .class("js-video-embed")
                .attr("src", "https://www.youtube.com/embed/firstVID1"),
        )
        .child(
            Markup::new("iframe")
                .class("js-video-embed")
                .attr("src", "https://www.youtube.com/embed/secondVID"),
        )]);
    let players = Arc::new(ScriptedPlayerFactory::new(PlayerScript::new(
        Behavior::Ready { after_ms: 0 },
    )));
    let supervisor = supervisor(&page, &players);

    let run = supervisor.run_page().await;
    assert!(run.previews.is_empty());
    let reports = EmbedSupervisor::collect(run.controllers).await;
    assert_eq!(reports.len(), 2);
    assert!(reports.iter().all(|r| r.scope == Scope::Trusted));
}
