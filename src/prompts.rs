// prompts.rs

/// Common instructions sent as the system message for every generation call.
pub const WRITER_SYSTEM: &str = r#"你是一名资深的中文新媒体内容编辑，擅长把数据洞察写成可以直接发布的原创文章。

重要要求：
1. 不要描述你正在做什么，也不要复述这些要求。
2. 不要以“好的”“以下是”之类的话开头。
3. 直接输出文章，第一行是标题，格式为“标题：……”，随后空一行开始正文。
4. 正文使用 Markdown，小标题使用 ##。
"#;

/// What the writer is asked to produce.
#[derive(Debug, Clone, Default)]
pub struct ArticleBrief<'a> {
    pub topic: &'a str,
    pub core_finding: Option<&'a str>,
    pub keywords: &'a [String],
    pub style: &'a str,
    pub length: Option<&'a str>,
    pub platform: &'a str,
    pub custom_instructions: Option<&'a str>,
}

fn style_guide(style: &str) -> &'static str {
    match style {
        "professional" => "专业严谨：用数据和事实说话，结构清晰，避免口语化表达。",
        "casual" => "轻松亲切：像朋友聊天一样表达，多用短句和生活化的例子。",
        "storytelling" => "故事化：以一个具体场景或人物开篇，在叙事中自然带出观点。",
        "humorous" => "幽默风趣：适度使用比喻和调侃，但不要偏离主题。",
        _ => "清晰易读：观点明确，段落简短，便于手机阅读。",
    }
}

fn length_guide(length: Option<&str>) -> &'static str {
    match length {
        Some("short") => "800字左右",
        Some("long") => "2500字左右",
        _ => "1500字左右",
    }
}

fn platform_guide(platform: &str) -> &'static str {
    match platform {
        "xiaohongshu" => {
            "小红书笔记：标题不超过20个字并带有吸引力，正文分点表达，适当使用表情符号，结尾附上3-5个话题标签（#话题）。"
        }
        _ => {
            "微信公众号文章：标题不超过64个字，开头三行抓住读者，使用小标题分节，结尾给出总结或互动引导。"
        }
    }
}

/// Builds the user prompt for a derivative article.
pub fn article_generation_prompt(brief: &ArticleBrief) -> String {
    let finding = brief
        .core_finding
        .map(|finding| format!("\n## 核心发现\n{}\n", finding))
        .unwrap_or_default();
    let keywords = if brief.keywords.is_empty() {
        String::new()
    } else {
        format!("\n## 需要自然融入的关键词\n{}\n", brief.keywords.join("、"))
    };
    let extra = brief
        .custom_instructions
        .filter(|text| !text.trim().is_empty())
        .map(|text| format!("\n## 额外要求\n{}\n", text))
        .unwrap_or_default();

    format!(
        r#"## 选题
{topic}
{finding}{keywords}
## 写作要求
* 发布平台：{platform}
* 写作风格：{style}
* 篇幅：{length}
* 内容必须原创，不要编造具体的统计数字或引用来源。
{extra}"#,
        topic = brief.topic,
        finding = finding,
        keywords = keywords,
        platform = platform_guide(brief.platform),
        style = style_guide(brief.style),
        length = length_guide(brief.length),
        extra = extra,
    )
}
