use anyhow::Result;

use crate::backend::{Article, ArticleList, ArticleQuery, BackendClient, Collection, SortField, SortOrder};
use crate::core::AppConfig;

fn meta_line(article: &Article) -> String {
    let mut meta = vec![format!("{} points", article.score)];
    if let Some(analysis) = &article.detailed_analysis {
        meta.push(format!("AI {:.1}", analysis.ai_score));
    }
    if let Some(posted_at) = article.posted_at() {
        meta.push(posted_at.format("%Y-%m-%d %H:%M").to_string());
    }
    if article.is_favorited {
        meta.push("★".to_string());
    }
    if article.is_read_later {
        meta.push("bookmarked".to_string());
    }
    meta.join(" · ")
}

fn format_article(article: &Article) -> String {
    let mut out = format!("[{}] {}", article.id, article.display_title());
    out.push_str(&format!("\n    {}", meta_line(article)));

    if let Some(analysis) = &article.detailed_analysis {
        out.push_str(&format!("\n    {}", analysis.summary));
    }
    if let Some(url) = &article.original_url {
        out.push_str(&format!("\n    {}", url));
    }
    out
}

fn format_detail(article: &Article) -> String {
    let mut out = vec![format!("[{}] {}", article.id, article.display_title())];
    if article.display_title() != article.original_title {
        out.push(article.original_title.clone());
    }
    if let Some(url) = &article.original_url {
        out.push(url.clone());
    }
    out.push(meta_line(article));

    let Some(analysis) = &article.detailed_analysis else {
        out.push(String::new());
        out.push("No AI analysis yet.".to_string());
        return out.join("\n");
    };
    if !analysis.tech_stack.is_empty() {
        out.push(format!("Tech stack: {}", analysis.tech_stack.join(", ")));
    }

    out.push(format!("\nSummary\n{}", analysis.summary));
    if !analysis.key_points.is_empty() {
        out.push("\nKey points".to_string());
        for (idx, point) in analysis.key_points.iter().enumerate() {
            out.push(format!("  {}. {}", idx + 1, point));
        }
    }
    out.push(format!("\nTakeaway\n\"{}\"", analysis.takeaway));
    if let Some(content) = analysis.url_content_trans.as_deref().filter(|c| !c.is_empty()) {
        out.push(format!("\nTranslated content\n{}", content));
    }
    out.join("\n")
}

fn format_list(list: &ArticleList) -> String {
    let mut out: Vec<String> = list.items.iter().map(format_article).collect();
    out.push(format!(
        "Page {} of {} ({} articles)",
        list.page, list.total_pages, list.total
    ));
    out.join("\n\n")
}

pub async fn list(
    config: &AppConfig,
    page: u32,
    size: u32,
    sort_by: Option<SortField>,
    order: Option<SortOrder>,
    collection: Option<Collection>,
) -> Result<()> {
    let client = BackendClient::from_config(config);
    let query = ArticleQuery {
        page: Some(page),
        size: Some(size),
        sort_by,
        order,
    };
    let list = match collection {
        Some(collection) => client.list_collection(collection, &query).await?,
        None => client.list_articles(&query).await?,
    };
    println!("{}", format_list(&list));
    Ok(())
}

pub async fn show(config: &AppConfig, id: i64) -> Result<()> {
    let article = BackendClient::from_config(config).get_article(id).await?;
    println!("{}", format_detail(&article));
    Ok(())
}

pub async fn toggle(config: &AppConfig, collection: Collection, id: i64, add: bool) -> Result<()> {
    BackendClient::from_config(config)
        .toggle(collection, id, add)
        .await?;
    let name = match collection {
        Collection::Favorites => "favorites",
        Collection::ReadLater => "read later",
    };
    if add {
        println!("Added article {} to {}", id, name);
    } else {
        println!("Removed article {} from {}", id, name);
    }
    Ok(())
}
