//! Text templates, emoji sets, and tag lists per content type.
//!
//! Templates use `{keyword}` and `{emoji}` placeholders.

use trendcast_core::ContentType;

pub(crate) struct Template {
    pub title: &'static str,
    pub body: &'static str,
}

const NEWS: &[Template] = &[
    Template {
        title: "{keyword}: breaking right now {emoji}",
        body: "{keyword} is blowing up across football social media with thousands of shares.\n\nUpdates as they land. Follow for the latest on {keyword}.",
    },
    Template {
        title: "BREAKING: {keyword} shakes up the football world",
        body: "Big news just dropped.\n\n{keyword} has everyone talking and it is one of the biggest stories of the day.\n\nStay tuned for more.",
    },
    Template {
        title: "{keyword} is today's most talked-about story {emoji}",
        body: "Fans can't stop discussing {keyword}. Thousands of posts in the last few hours and it is trending across every platform.",
    },
];

const MEME: &[Template] = &[
    Template {
        title: "Can't stop laughing at {keyword} \u{1F602}",
        body: "The {keyword} memes are here \u{1F923}\n\nTag a mate who needs to see this \u{1F447}",
    },
    Template {
        title: "{keyword} has officially become a meme \u{1F923}",
        body: "No idea who made these but they are gold.\n\n{keyword} is everywhere right now. Share with your group chat!",
    },
    Template {
        title: "The internet is roasting {keyword} \u{1F606}",
        body: "Everyone is posting edits of {keyword}. The more you scroll the funnier it gets.\n\nDrop your best one below \u{1F602}",
    },
];

const HOT_TAKE: &[Template] = &[
    Template {
        title: "Straight talk on {keyword}: what nobody wants to say {emoji}",
        body: "Everyone is arguing about {keyword}, but who is being honest?\n\nMy take: {keyword} is being blown way out of proportion.\n\nAgree or disagree?",
    },
    Template {
        title: "Unpopular opinion about {keyword} \u{1F5E3}",
        body: "Not afraid of the replies, so here it is:\n\n{keyword} does not deserve this much attention.\n\nAm I the only one who sees it?",
    },
    Template {
        title: "The part of the {keyword} story nobody is covering {emoji}",
        body: "All anyone talks about is {keyword}, so here is another angle.\n\nWhat you see on your timeline is not the whole picture. Look at it from both sides first.",
    },
];

const ANALYSIS: &[Template] = &[
    Template {
        title: "Deep dive on {keyword}: what is actually happening? \u{1F4CA}",
        body: "ANALYSIS: {keyword}\n\nWhere things stand: {keyword} is drawing huge attention from fans.\n\nBy the numbers:\n- thousands of interactions\n- trending for the past 24h\n\nVerdict: expect this to keep moving in the days ahead.",
    },
    Template {
        title: "Why is {keyword} going viral? \u{1F914}",
        body: "What made {keyword} the topic of the day:\n\n1. The surprise factor\n2. It touches a lot of fans\n3. It splits opinion\n4. It is genuinely entertaining\n\nThoughts on this breakdown?",
    },
];

const FAN_OPINION: &[Template] = &[
    Template {
        title: "What are fans saying about {keyword}? {emoji}",
        body: "FAN VOICES: {keyword}\n\nSome of the loudest reactions:\n- \"Unreal. {keyword} deserves the credit!\"\n- \"Never saw {keyword} coming\"\n- \"Fans have waited years for this\"\n\nWhere do you stand on {keyword}?",
    },
    Template {
        title: "The timeline is split over {keyword} \u{1F30A}",
        body: "Fans are going at it over {keyword}.\n\nTeam yes: \"{keyword} is brilliant!\"\nTeam no: \"Can't get behind {keyword}.\"\n\nPick a side below.",
    },
];

const IMAGE_CAPTION: &[Template] = &[
    Template {
        title: "When you first hear about {keyword} \u{1F602}",
        body: "[{keyword} photo]\n\nYour reaction to {keyword}: shock, disbelief, then laughter.\n\nTag someone and see how they react \u{1F447}",
    },
    Template {
        title: "{keyword} be like: \u{1F60E}",
        body: "[{keyword} photo]\n\nAn instant classic \u{1F4F8}\n\nLike and share if this made your day.",
    },
];

pub(crate) fn templates_for(content_type: ContentType) -> &'static [Template] {
    match content_type {
        ContentType::News => NEWS,
        ContentType::Meme => MEME,
        ContentType::HotTake => HOT_TAKE,
        ContentType::Analysis => ANALYSIS,
        ContentType::FanOpinion => FAN_OPINION,
        ContentType::ImageCaption => IMAGE_CAPTION,
    }
}

const POSITIVE_EMOJI: &[&str] = &[
    "\u{1F525}", "\u{26A1}", "\u{1F4AA}", "\u{1F389}", "\u{1F44F}", "\u{1F64C}", "\u{2728}", "\u{1F4AF}",
];
const NEGATIVE_EMOJI: &[&str] = &[
    "\u{1F631}", "\u{1F494}", "\u{1F624}", "\u{1F621}", "\u{1F62D}", "\u{1F926}", "\u{1F612}",
];
const NEUTRAL_EMOJI: &[&str] = &[
    "\u{26BD}", "\u{1F3C6}", "\u{1F4CA}", "\u{1F3AF}", "\u{1F440}", "\u{1F4F0}", "\u{1F5E3}",
];

pub(crate) fn emoji_set(sentiment: f64) -> &'static [&'static str] {
    if sentiment < -0.3 {
        NEGATIVE_EMOJI
    } else if sentiment > 0.3 {
        POSITIVE_EMOJI
    } else {
        NEUTRAL_EMOJI
    }
}

pub(crate) const BASE_HASHTAGS: &[&str] = &["Football", "Soccer", "FootballNews", "MatchDay"];

pub(crate) fn type_hashtags(content_type: ContentType) -> &'static [&'static str] {
    match content_type {
        ContentType::Meme => &["Meme", "Funny", "FootballMemes", "Banter"],
        ContentType::HotTake => &["HotTake", "Opinion", "Controversial", "Debate"],
        ContentType::Analysis => &["Analysis", "Tactics", "Stats", "Breakdown"],
        ContentType::News => &["News", "Breaking", "Update", "Headlines"],
        ContentType::FanOpinion => &["Fans", "FanVoice", "Community"],
        ContentType::ImageCaption => &["Photo", "Moment", "Picture", "Capture"],
    }
}

pub(crate) const BASE_IMAGE_TERMS: &[&str] = &["football", "soccer"];

pub(crate) fn type_image_terms(content_type: ContentType) -> &'static [&'static str] {
    match content_type {
        ContentType::Meme => &["funny", "meme", "reaction"],
        ContentType::HotTake => &["serious", "debate", "controversy"],
        ContentType::Analysis => &["tactical", "stats", "analysis"],
        ContentType::News => &["breaking", "news", "announcement"],
        ContentType::FanOpinion => &["fans", "crowd", "celebration"],
        ContentType::ImageCaption => &["action", "moment", "highlight"],
    }
}

/// Substitute the placeholders in a template string.
pub(crate) fn render(template: &str, keyword: &str, emoji: &str) -> String {
    template.replace("{keyword}", keyword).replace("{emoji}", emoji)
}
