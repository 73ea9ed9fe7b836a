//! crates/docgen_core/src/prompts.rs
//!
//! Prompt construction for the text generation service, plus the static text
//! used when the service is unavailable.

use crate::domain::{GenerationRequirements, Language, TemplateType};

pub const CHART_MARKER_ZH: &str = "[图表位置]";
pub const CHART_MARKER_EN: &str = "[CHART LOCATION]";
pub const FORMULA_MARKER_ZH: &str = "[公式位置]";
pub const FORMULA_MARKER_EN: &str = "[FORMULA LOCATION]";

const ACADEMIC_SECTIONS_ZH: [&str; 8] = [
    "摘要",
    "引言",
    "文献综述",
    "研究方法",
    "研究结果",
    "讨论与分析",
    "结论",
    "参考文献",
];

const ACADEMIC_SECTIONS_EN: [&str; 8] = [
    "Abstract",
    "Introduction",
    "Literature Review",
    "Methodology",
    "Findings",
    "Discussion and Analysis",
    "Conclusion",
    "References",
];

const BUSINESS_SECTIONS_ZH: [&str; 8] = [
    "执行摘要",
    "背景介绍",
    "市场分析",
    "数据分析",
    "建议与策略",
    "实施计划",
    "风险评估",
    "结论",
];

const BUSINESS_SECTIONS_EN: [&str; 8] = [
    "Executive Summary",
    "Background",
    "Market Analysis",
    "Data Analysis",
    "Recommendations and Strategies",
    "Implementation Plan",
    "Risk Assessment",
    "Conclusion",
];

/// Builds the prompt for a topic according to its document type and language.
pub fn build_prompt(topic: &str, requirements: &GenerationRequirements) -> String {
    match (requirements.template_type, requirements.language) {
        (TemplateType::Academic, Language::Zh) => academic_zh(topic, requirements),
        (TemplateType::Academic, Language::En) => academic_en(topic, requirements),
        (TemplateType::Business, Language::Zh) => business_zh(topic, requirements),
        (TemplateType::Business, Language::En) => business_en(topic, requirements),
    }
}

fn numbered(sections: &[&str]) -> String {
    sections
        .iter()
        .enumerate()
        .map(|(i, s)| format!("  {}. {}\n", i + 1, s))
        .collect()
}

fn academic_zh(topic: &str, reqs: &GenerationRequirements) -> String {
    let mut prompt = format!(
        "请撰写一篇关于\"{topic}\"的学术论文。\n\n要求：\n- 严格的学术写作风格\n- 字数约{}字\n- 包含以下章节：\n{}\n- 使用专业的学术语言\n",
        reqs.word_count,
        numbered(&ACADEMIC_SECTIONS_ZH),
    );
    if reqs.include_charts {
        prompt.push_str(&format!("- 在适当位置标注需要插入图表的地方 {CHART_MARKER_ZH}\n"));
    }
    if reqs.include_formulas {
        prompt.push_str(&format!("- 在需要数学公式的地方标注 {FORMULA_MARKER_ZH}\n"));
    }
    prompt.push_str("- 确保逻辑严谨，论证充分\n- 提供真实的参考文献格式\n\n请生成完整的论文内容：\n");
    prompt
}

fn academic_en(topic: &str, reqs: &GenerationRequirements) -> String {
    let mut prompt = format!(
        "Please write a comprehensive academic paper on the topic: \"{topic}\"\n\nRequirements:\n- Strict academic writing style\n- Approximately {} words\n- Include the following sections:\n{}\n- Use professional academic language\n",
        reqs.word_count,
        numbered(&ACADEMIC_SECTIONS_EN),
    );
    if reqs.include_charts {
        prompt.push_str(&format!("- Mark places for charts with {CHART_MARKER_EN}\n"));
    }
    if reqs.include_formulas {
        prompt.push_str(&format!("- Mark places for formulas with {FORMULA_MARKER_EN}\n"));
    }
    prompt.push_str(
        "- Ensure logical rigor and sufficient argumentation\n- Provide proper reference formatting\n\nPlease generate the complete paper content:\n",
    );
    prompt
}

fn business_zh(topic: &str, reqs: &GenerationRequirements) -> String {
    let mut prompt = format!(
        "请撰写一份关于\"{topic}\"的商业报告。\n\n要求：\n- 专业的商业报告风格\n- 字数约{}字\n- 包含以下章节：\n{}\n- 使用专业的商业语言\n",
        reqs.word_count,
        numbered(&BUSINESS_SECTIONS_ZH),
    );
    if reqs.include_charts {
        prompt.push_str(&format!("- 在适当位置标注需要插入图表的地方 {CHART_MARKER_ZH}\n"));
    }
    prompt.push_str("- 提供具体的数据分析和建议\n- 结构清晰，重点突出\n\n请生成完整的报告内容：\n");
    prompt
}

fn business_en(topic: &str, reqs: &GenerationRequirements) -> String {
    let mut prompt = format!(
        "Please write a comprehensive business report on the topic: \"{topic}\"\n\nRequirements:\n- Professional business writing style\n- Approximately {} words\n- Include the following sections:\n{}\n- Use professional business language\n",
        reqs.word_count,
        numbered(&BUSINESS_SECTIONS_EN),
    );
    if reqs.include_charts {
        prompt.push_str(&format!("- Mark places for charts with {CHART_MARKER_EN}\n"));
    }
    prompt.push_str(
        "- Provide specific data analysis and recommendations\n- Clear structure with emphasized key points\n\nPlease generate the complete report content:\n",
    );
    prompt
}

/// Sample paper used whenever the text generation service cannot answer.
pub const FALLBACK_CONTENT: &str = "学术论文示例内容

摘要
本文探讨了相关主题的研究现状和发展趋势。通过综合分析现有文献和研究方法，提出了新的研究视角和分析框架。

1. 引言
研究背景和意义在此阐述。当前领域面临的主要问题和挑战需要系统性的分析和解决方案。

2. 文献综述
现有研究主要集中在以下几个方面：[图表位置]
主要理论框架包括...
研究方法主要采用...

3. 研究方法
本研究采用定量与定性相结合的方法进行分析。数据收集和处理过程如下：[公式位置]
研究假设和验证方法...

4. 研究结果
通过分析发现：[图表位置]
主要研究结果包括...
数据表明...

5. 讨论与分析
结果分析表明...[公式位置]
与现有研究的比较...
理论意义和实践价值...

6. 结论
总结研究发现和贡献...
研究局限性和未来方向...

参考文献
1. 作者 (年份). 文章标题. 期刊名称.
2. 作者 (年份). 书籍名称. 出版社.
";

#[cfg(test)]
mod tests {
    use super::*;

    fn reqs(template_type: TemplateType, language: Language) -> GenerationRequirements {
        GenerationRequirements {
            template_type,
            language,
            ..GenerationRequirements::default()
        }
    }

    #[test]
    fn academic_chinese_prompt_lists_sections_and_markers() {
        let prompt = build_prompt("气候变化对农业的影响", &reqs(TemplateType::Academic, Language::Zh));
        assert!(prompt.contains("气候变化对农业的影响"));
        assert!(prompt.contains("字数约2000字"));
        assert!(prompt.contains("  3. 文献综述"));
        assert!(prompt.contains(CHART_MARKER_ZH));
        assert!(prompt.contains(FORMULA_MARKER_ZH));
    }

    #[test]
    fn english_business_prompt_never_asks_for_formulas() {
        let prompt = build_prompt("EV market", &reqs(TemplateType::Business, Language::En));
        assert!(prompt.contains("business report"));
        assert!(prompt.contains("  8. Conclusion"));
        assert!(prompt.contains(CHART_MARKER_EN));
        assert!(!prompt.contains(FORMULA_MARKER_EN));
    }

    #[test]
    fn disabled_markers_are_left_out() {
        let mut r = reqs(TemplateType::Academic, Language::En);
        r.include_charts = false;
        r.include_formulas = false;
        r.word_count = 800;
        let prompt = build_prompt("Graph theory", &r);
        assert!(prompt.contains("Approximately 800 words"));
        assert!(!prompt.contains(CHART_MARKER_EN));
        assert!(!prompt.contains(FORMULA_MARKER_EN));
    }

    #[test]
    fn fallback_carries_two_of_each_marker() {
        assert_eq!(FALLBACK_CONTENT.matches(CHART_MARKER_ZH).count(), 2);
        assert_eq!(FALLBACK_CONTENT.matches(FORMULA_MARKER_ZH).count(), 2);
    }
}
