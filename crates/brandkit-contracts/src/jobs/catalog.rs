use serde::{Deserialize, Serialize};

const PRODUCT_SLOT: &str = "{product}";
const AVATAR_SLOT: &str = "{avatar}";

/// One generation request, fully rendered for a single run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationJob {
    pub title: String,
    pub prompt_text: String,
}

#[derive(Clone, Copy, Debug)]
pub struct JobTemplate {
    pub title: &'static str,
    pub template: &'static str,
}

impl JobTemplate {
    fn render(&self, product: &str, avatar: &str) -> GenerationJob {
        GenerationJob {
            title: self.title.to_string(),
            prompt_text: fill_slots(self.template, product, avatar),
        }
    }
}

/// Fills the slots in one pass over the template, so slot markers inside the
/// inserted values are left as written.
fn fill_slots(template: &str, product: &str, avatar: &str) -> String {
    let mut out = String::with_capacity(template.len() + product.len() + avatar.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        if let Some(after) = tail.strip_prefix(PRODUCT_SLOT) {
            out.push_str(product);
            rest = after;
        } else if let Some(after) = tail.strip_prefix(AVATAR_SLOT) {
            out.push_str(avatar);
            rest = after;
        } else {
            out.push('{');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    out
}

pub const BASE_TEMPLATES: &[JobTemplate] = &[
    JobTemplate {
        title: "Lifestyle Photo",
        template: "Create a photorealistic lifestyle photograph featuring this product: {product}. \
                   Show it being used naturally in an everyday setting with soft natural light and a warm, inviting mood.",
    },
    JobTemplate {
        title: "Action Shot",
        template: "Create a dynamic action shot of this product: {product}. \
                   Capture it in motion or mid-use with an energetic composition and a shallow depth of field.",
    },
    JobTemplate {
        title: "Advertising Pamphlet",
        template: "Design a clean, print-ready advertising pamphlet for this product: {product}. \
                   Feature the product prominently and leave space for a headline and short benefit bullets.",
    },
    JobTemplate {
        title: "Product Shot on white background",
        template: "Create a professional e-commerce product shot of this product: {product}. \
                   Isolate it on a pure white background with even studio lighting and a subtle contact shadow.",
    },
    JobTemplate {
        title: "Multi-Angle View",
        template: "Create a multi-angle product sheet for this product: {product}. \
                   Show front, side, back and three-quarter views arranged on a neutral background.",
    },
    JobTemplate {
        title: "Website Banner",
        template: "Design a wide website hero banner for this product: {product}. \
                   Use a 16:9 composition with the product on one side and open space for headline text on the other.",
    },
    JobTemplate {
        title: "Social Media Post",
        template: "Design an eye-catching square social media post for this product: {product}. \
                   Use bold colors, a scroll-stopping composition and room for a short caption.",
    },
];

pub const AVATAR_TEMPLATES: &[JobTemplate] = &[
    JobTemplate {
        title: "Avatar Portrait",
        template: "Create a friendly brand avatar portrait of {avatar}. \
                   The avatar represents this product: {product}. Keep the product visible in the frame.",
    },
    JobTemplate {
        title: "Avatar with Product",
        template: "Show {avatar} proudly holding and presenting this product: {product}. \
                   Studio lighting, clean backdrop, commercial photography style.",
    },
    JobTemplate {
        title: "Avatar Lifestyle Scene",
        template: "Show {avatar} using this product in a real-life setting: {product}. \
                   Natural light, candid moment, authentic lifestyle photography.",
    },
    JobTemplate {
        title: "Avatar Testimonial",
        template: "Create a testimonial-style ad where {avatar} recommends this product: {product}. \
                   Warm, trustworthy tone with space for a short quote.",
    },
    JobTemplate {
        title: "Avatar Social Story",
        template: "Create a vertical 9:16 social media story featuring {avatar} with this product: {product}. \
                   Playful, vibrant and mobile-first.",
    },
    JobTemplate {
        title: "Avatar Billboard",
        template: "Design an outdoor billboard featuring {avatar} next to this product: {product}. \
                   Large, bold and readable from a distance.",
    },
];

const AVATAR_PERSONA_TEMPLATE: &str = "Look at this product image. The product is described as: {product}. \
     In one sentence, describe a plausible brand mascot or persona who would represent this product in marketing. \
     Reply with the description only.";

pub fn avatar_persona_prompt(product: &str) -> String {
    fill_slots(AVATAR_PERSONA_TEMPLATE, product, "")
}

/// Renders the job list for one run: base jobs in catalog order, followed by
/// the avatar jobs when an avatar description is available.
pub fn build_jobs(product: &str, avatar: Option<&str>) -> Vec<GenerationJob> {
    let product = product.trim();
    let mut jobs: Vec<GenerationJob> = BASE_TEMPLATES
        .iter()
        .map(|template| template.render(product, ""))
        .collect();
    if let Some(avatar) = avatar.map(str::trim).filter(|value| !value.is_empty()) {
        jobs.extend(
            AVATAR_TEMPLATES
                .iter()
                .map(|template| template.render(product, avatar)),
        );
    }
    jobs
}
