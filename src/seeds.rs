//! Seed data and deterministic fallbacks.
//!
//! The curriculum, shop catalogue and first-run records guarantee the service
//! is usable with an empty data directory; the fallback values keep a lesson
//! moving whenever the oracle is unavailable.

use crate::domain::{
  ActivityItem, ActivityType, ClassGroup, ConceptCheck, Grade, LearningModule, LessonContent, LessonIntro,
  ModuleTheme, ShopItem, ShopSlot, Student, Teacher, TeacherAssessment, WorkedExample,
};
use crate::oracle::{PlacementOutcome, PlacementQuestion, ReadingAnalysis, ReadingPassage};

pub const FALLBACK_GRADE_SCORE: u8 = 3;
pub const FALLBACK_GRADE_FEEDBACK: &str = "Good effort! I think you've got the idea.";
pub const PERFECT_RUN_ANALYSIS: &str = "Perfect score! You're a legend!";
pub const FALLBACK_MISTAKE_ANALYSIS: &str = "Keep practicing! You'll get it next time.";
pub const FALLBACK_TUTOR_REPLY: &str = "Sorry, I'm having trouble hearing you! Check your connection.";

fn module(id: &str, title: &str, level: &str, theme: ModuleTheme, description: &str, rule: &str) -> LearningModule {
  LearningModule {
    id: id.into(),
    title: title.into(),
    level: level.into(),
    theme,
    description: description.into(),
    rule_explanation: rule.into(),
    is_custom: false,
    custom_words: Vec::new(),
    created_by: None,
  }
}

/// Standard curriculum, NZC Level 1 through NCEA Level 3.
pub fn standard_modules() -> Vec<LearningModule> {
  use ModuleTheme::*;
  vec![
    // NZC Level 1 (Years 0-2): the code
    module("l1_satpin", "Initial Sounds (SATPIN)", "Level 1 (Year 0-1)", Forest,
      "Start with S, A, T, P, I, N.",
      "These letters make distinct sounds. \"A\" says /a/ (apple), \"S\" says /s/ (snake)."),
    module("l1_short_vowels", "Short Vowels (A E I O U)", "Level 1 (Year 1)", Forest,
      "Hearing the difference between cat, cot, cut, kit, ket.",
      "Short vowels are quick sounds. A (apple), E (egg), I (igloo), O (octopus), U (umbrella)."),
    module("l1_cvc", "CVC Foundations", "Level 1 (Year 1)", Forest,
      "Building simple words like Cat, Dog, Bus.",
      "Consonant-Vowel-Consonant words usually have a short vowel sound."),
    module("l1_digraphs", "Digraph Discovery", "Level 1 (Year 1-2)", Ocean,
      "Two letters, one sound: sh, ch, th, ng.",
      "When H makes friends with S, C, or T, they make a new sound together."),
    module("l1_blends", "Blends Beach", "Level 1 (Year 2)", Ocean,
      "Beginning and ending blends (st, bl, tr, nd).",
      "In a blend, you can hear both sounds gliding together quickly."),
    module("l1_floss", "The Floss Rule", "Level 1 (Year 2)", Ocean,
      "Double letters at the end (ff, ll, ss, zz).",
      "If a short vowel word ends in f, l, s, or z, double it! (Hill, Mess, Buzz)."),
    module("l1_ck_rule", "The \"ck\" Rule", "Level 1 (Year 2)", Ocean,
      "When to use \"ck\" vs \"k\" at the end of a word.",
      "Use \"ck\" right after a short vowel (Duck). Use \"k\" after a consonant or long vowel (Milk, Cake)."),
    // NZC Level 2 (Years 3-4): patterns and syllables
    module("l2_magic_e", "Magic E Oasis", "Level 2 (Year 3)", Desert,
      "Silent E makes the vowel say its name.",
      "An \"e\" at the end jumps over one consonant to make the vowel long. (Hop -> Hope)."),
    module("l2_syllables_open", "Open & Closed Syllables", "Level 2 (Year 3)", Desert,
      "Breaking words into chunks.",
      "Closed syllable ends in a consonant (short vowel: Cat). Open syllable ends in a vowel (long vowel: Go, Hi)."),
    module("l2_vowel_teams", "Vowel Team Valley", "Level 2 (Year 3-4)", Forest,
      "Common teams: ai, ay, ee, ea, oa.",
      "When two vowels go walking, the first one does the talking (Rain, Boat)."),
    module("l2_bossy_r", "Bossy R Canyon", "Level 2 (Year 3-4)", Desert,
      "ar, or, er, ir, ur patterns.",
      "The letter R changes the vowel sound. Car, Fork, Bird, Turn."),
    module("l2_soft_c_g", "Soft C and G", "Level 2 (Year 4)", Desert,
      "When C sounds like S, and G sounds like J.",
      "C and G go soft when followed by E, I, or Y (City, Gem, Gym)."),
    module("l2_y_ending", "The Many Sounds of Y", "Level 2 (Year 4)", Desert,
      "Y as a vowel at the end of words.",
      "In short words, Y says \"I\" (Sky). In long words, Y says \"E\" (Happy)."),
    // NZC Level 3 (Years 5-6): morphology
    module("l3_plurals", "Plural Peaks", "Level 3 (Year 5)", Volcano,
      "Adding -s, -es, and changing y to i.",
      "Add -es for sh/ch/s/x/z. Change Y to I and add ES if consonant before Y (Baby -> Babies)."),
    module("l3_apostrophes", "Possession Station", "Level 3 (Year 5)", Volcano,
      "Using apostrophes for ownership.",
      "Use 's for one owner (The dog's bone). Use s' for many owners (The dogs' bones)."),
    module("l3_doubling", "The Doubling Rule", "Level 3 (Year 5-6)", Volcano,
      "Adding suffixes like -ing and -ed.",
      "Double the final consonant if the word has 1 syllable, 1 short vowel, and 1 ending consonant (Run -> Running). Do not double if it has two consonants (Jump -> Jumping)."),
    module("l3_prefixes", "Prefix Power", "Level 3 (Year 6)", Volcano,
      "Changing meaning with un-, re-, dis-, pre-.",
      "Prefixes attach to the front. Re- means again. Un- means not."),
    module("l3_schwa", "The Schwa Sound", "Level 3 (Year 6)", Volcano,
      "The unstressed \"uh\" sound in longer words.",
      "Any vowel can say \"uh\" in an unstressed syllable (About, Pencil, Doctor)."),
    module("l3_homophones", "Tricky Homophones", "Level 3 (Year 6)", Volcano,
      "There, Their, They're and friends.",
      "There (place), Their (owner), They're (they are). To (direction), Too (also), Two (2)."),
    // NZC Level 4 (Years 7-8): etymology
    module("l4_roots", "Greek & Latin Roots", "Level 4 (Year 7)", Space,
      "Building blocks: Tele, Scope, Port, Struct.",
      "English words are like lego. Tele (far) + Scope (see) = Telescope."),
    module("l4_silent_letters", "Silent Letter Space", "Level 4 (Year 7)", Space,
      "Ghost letters: kn, gn, wr, mb.",
      "Silent letters are history traces. Knight (Old English), Psychology (Greek)."),
    module("l4_complex_endings", "Complex Endings", "Level 4 (Year 8)", Space,
      "-tion, -sion, -cian, -ture.",
      "-tion is common. -sion often follows S or D (Expand -> Expansion). -cian is for people (Musician)."),
    module("l4_adv_suffixes", "Advanced Suffixes", "Level 4 (Year 8)", Space,
      "-ance vs -ence, -able vs -ible.",
      "Hard rules! Often -able if you can hear the base word (Comfort -> Comfortable)."),
    // NZC Level 5 (Years 9-10): academic
    module("l5_acad_verbs", "Academic Verbs", "Level 5 (Year 9)", Space,
      "Essay words: Analyse, Evaluate, Synthesise.",
      "Academic spelling is precise. Analyse (NZ/UK) vs Analyze (US)."),
    module("l5_hyphens", "Hyphenation Station", "Level 5 (Year 9)", Space,
      "Compound adjectives and prefixes.",
      "Hyphenate compound adjectives before a noun (A well-known author) but not after (The author is well known)."),
    module("l5_sci_terms", "Scientific Vocabulary", "Level 5 (Year 10)", Space,
      "Photosynthesis, Chromatography, Hypothesis.",
      "Science words use Greek/Latin logic. Photo (light) + Synthesis (put together)."),
    module("l5_foreign", "Loan Words", "Level 5 (Year 10)", Space,
      "French and Maori loan words.",
      "Loan words keep original spelling. Ch -> /sh/ in Chef (French). Wh -> /f/ in Whānau (Maori)."),
    module("l5_lit_terms", "Literary Analysis", "Level 5 (Year 10)", Space,
      "Metaphor, Simile, Onomatopoeia, Soliloquy.",
      "Many literary terms come from Greek. Onomatopoeia is spelling sounds."),
    // NCEA Levels 1-3 (Years 11-13)
    module("l6_unfamiliar_text", "Unfamiliar Text Analysis", "NCEA Level 1 (Year 11)", Space,
      "Identifying tone, purpose, and audience.",
      "Writers use specific choices to target an audience. Tones can be objective, subjective, critical, or nostalgic."),
    module("l6_language_features", "Advanced Language Features", "NCEA Level 1 (Year 11)", Space,
      "Hyperbole, Litotes, Euphemism, Paradox.",
      "Advanced features add nuance. Litotes is understatement (Not bad). Paradox is a contradictory truth."),
    module("l7_critical_analysis", "Critical Analysis", "NCEA Level 2 (Year 12)", Space,
      "Evaluating bias, reliability, and subtext.",
      "Critical analysis looks beneath the surface. Bias is an inclination for or against a group or idea."),
    module("l7_academic_vocab", "Academic Vocabulary L2", "NCEA Level 2 (Year 12)", Space,
      "Words for precise academic expression.",
      "Use precise verbs. Instead of \"says\", use \"asserts\", \"implies\", or \"demonstrates\"."),
    module("l8_argumentation", "Complex Argumentation", "NCEA Level 3 (Year 13)", Space,
      "Constructing nuanced arguments and counter-arguments.",
      "A strong argument acknowledges complexity. Use \"However\", \"Conversely\", \"While it is true that...\" to weave ideas."),
    module("l8_scholarly_conventions", "Scholarly Writing", "NCEA Level 3 (Year 13)", Space,
      "Citations, referencing, and objective voice.",
      "Scholarly writing requires evidence. Integrate quotes seamlessly and reference sources accurately."),
  ]
}

pub fn shop_items() -> Vec<ShopItem> {
  use ShopSlot::*;
  let item = |id: &str, name: &str, slot: ShopSlot, icon: &str, cost: u32| ShopItem {
    id: id.into(),
    name: name.into(),
    slot,
    icon: icon.into(),
    cost,
  };
  vec![
    item("hat_top", "Top Hat", Hat, "🎩", 20),
    item("hat_cap", "Cool Cap", Hat, "🧢", 15),
    item("hat_crown", "Royal Crown", Hat, "👑", 50),
    item("hat_wizard", "Wizard Hat", Hat, "🧙", 40),
    item("glass_sunglasses", "Sunnies", Glasses, "😎", 15),
    item("glass_nerd", "Smart Specs", Glasses, "👓", 10),
    item("acc_bow", "Bow Tie", Accessory, "🎀", 10),
    item("acc_scarf", "Scarf", Accessory, "🧣", 12),
    item("acc_medal", "Medal", Accessory, "🥇", 30),
    item("bg_forest", "Forest", Background, "🌲", 25),
    item("bg_beach", "Beach", Background, "🏖️", 25),
    item("bg_space", "Space", Background, "🌌", 40),
  ]
}

pub fn seed_teachers() -> Vec<Teacher> {
  vec![Teacher {
    id: "t1".into(),
    name: "Mr. D".into(),
    email: "teacher@example.school.nz".into(),
    password: "changeme".into(),
    avatar: Some("👨‍🏫".into()),
  }]
}

pub fn seed_classes() -> Vec<ClassGroup> {
  vec![
    ClassGroup {
      id: "c1".into(),
      teacher_id: "t1".into(),
      name: "Room 1".into(),
      student_ids: vec!["s1".into(), "s2".into()],
      avatar: Some("🚀".into()),
    },
    ClassGroup {
      id: "c2".into(),
      teacher_id: "t1".into(),
      name: "Senior English".into(),
      student_ids: vec!["s3".into(), "s4".into()],
      avatar: Some("🎓".into()),
    },
  ]
}

pub fn seed_students() -> Vec<Student> {
  let junior_assignments: Vec<String> =
    ["l2_magic_e", "l2_syllables_open", "l2_vowel_teams", "l2_bossy_r", "l2_soft_c_g", "l2_y_ending"]
      .iter()
      .map(|s| s.to_string())
      .collect();

  let mut s1 = Student::new("s1", "MOA-176", "Nethalee");
  s1.avatar = "👸".into();
  s1.year_level = Some(4);
  s1.assigned_module_ids = junior_assignments.clone();

  let mut s2 = Student::new("s2", "HAKA-283", "Yuven");
  s2.avatar = "✈️".into();
  s2.year_level = Some(4);
  s2.assigned_module_ids = junior_assignments;

  let mut s3 = Student::new("s3", "UDARI-13", "Udari");
  s3.avatar = "👩‍🎓".into();
  s3.year_level = Some(13);
  s3.assigned_module_ids = vec!["l8_argumentation".into(), "l8_scholarly_conventions".into()];
  s3.teacher_assessment = Some(TeacherAssessment {
    reading_level: 13,
    focus_areas: vec!["Critical Analysis".into(), "Complex Argumentation".into()],
  });

  let mut s4 = Student::new("s4", "VONAL-10", "Vonal");
  s4.avatar = "🕵️".into();
  s4.year_level = Some(10);
  s4.assigned_module_ids = vec!["l5_sci_terms".into(), "l5_foreign".into(), "l5_lit_terms".into()];
  s4.teacher_assessment = Some(TeacherAssessment {
    reading_level: 10,
    focus_areas: vec!["Scientific Vocabulary".into()],
  });

  vec![s1, s2, s3, s4]
}

fn fallback_item(id: &str, kind: ActivityType, prompt: &str, answer: &str, distractors: &[&str], explanation: &str, hint: &str) -> ActivityItem {
  ActivityItem {
    id: id.into(),
    kind,
    prompt: prompt.into(),
    correct_answer: answer.into(),
    options: Vec::new(),
    distractors: distractors.iter().map(|d| d.to_string()).collect(),
    explanation: explanation.into(),
    hint: hint.into(),
  }
}

/// Canned short-vowel lesson used whenever generation fails.
pub fn fallback_lesson() -> LessonContent {
  use ActivityType::*;
  LessonContent {
    intro: LessonIntro {
      title: "Short Vowel Sounds".into(),
      explanation: "CVC words are short words that have a Consonant, then a Vowel, then a Consonant. The vowel makes a short sound.".into(),
      examples: vec![
        WorkedExample { word: "Cat".into(), sentence: "The cat sat on the mat.".into() },
        WorkedExample { word: "Pig".into(), sentence: "The pig likes mud.".into() },
      ],
    },
    practice: vec![
      fallback_item("p1", Matching, "What does \"CVC\" stand for?", "Consonant Vowel Consonant",
        &["Cat Van Can", "Circle Very Cool", "Cool Very Cool"],
        "CVC describes the pattern of letters.", "Think about the types of letters."),
      fallback_item("p2", BuildWord, "Spell the word for a pet that barks.", "dog", &[],
        "D-O-G. Short \"o\" sound.", "Starts with D."),
      fallback_item("p3", Sorting, "Which word has a short \"a\"?", "hat", &["late"],
        "Hat is short. Late is long.", "Listen for the quick sound."),
    ],
    concept_check: ConceptCheck {
      question: "What is a CVC word?".into(),
      grading_guidance: "Look for mentions of Consonant Vowel Consonant or short sounds.".into(),
    },
    quiz: vec![
      fallback_item("q1", FixSentence, "The sunn is hot.", "sun", &[], "Sun only needs one n.", ""),
      fallback_item("q2", BuildWord, "Spell the word for a square container.", "box", &[], "B-O-X", ""),
      fallback_item("q3", Matching, "Which letter is the vowel in \"PIG\"?", "I", &["P", "G", "U", "A"],
        "I is the vowel.", "A, E, I, O, U"),
    ],
    conclusion: "You are a master of short sounds! Kia pai tō mahi!".into(),
  }
}

pub fn fallback_grade() -> Grade {
  Grade { score: FALLBACK_GRADE_SCORE, feedback: FALLBACK_GRADE_FEEDBACK.into() }
}

pub fn fallback_placement_test() -> Vec<PlacementQuestion> {
  let q = |answer: &str, distractors: [&str; 3], level: u32| PlacementQuestion {
    question: "Select the correct spelling.".into(),
    correct_answer: answer.into(),
    distractors: distractors.iter().map(|d| d.to_string()).collect(),
    level,
  };
  vec![
    q("Cat", ["Kat", "Catt", "Caat"], 1),
    q("Happy", ["Hapy", "Happee", "Hapey"], 2),
    q("Because", ["Becoz", "Becuase", "Beceuse"], 3),
    q("Necessary", ["Neccessary", "Necesary", "Nesessary"], 4),
    q("Accommodation", ["Acommodation", "Accomodation", "Acomodation"], 5),
  ]
}

pub fn fallback_placement_outcome() -> PlacementOutcome {
  PlacementOutcome { level: 1, analysis: "Good effort! Let's start from Level 1 and build up.".into() }
}

pub fn fallback_reading_passage() -> ReadingPassage {
  ReadingPassage {
    title: "The Forest".into(),
    content: "Tudor the Kiwi walked through the green forest. He was looking for bugs to eat.".into(),
  }
}

pub fn fallback_reading_analysis(year_level: u32) -> ReadingAnalysis {
  ReadingAnalysis {
    difficult_words: Vec::new(),
    misread_words: Vec::new(),
    feedback: "Great effort reading today! I had a little trouble hearing the file.".into(),
    assessed_level: format!("Level {year_level}"),
    transcript: None,
  }
}

/// (focus, reference snippet) per school year, used to calibrate generated
/// reading passages. Years outside 1-13 are clamped.
const READING_REFERENCES: [(&str, &str); 13] = [
  ("Simple sentences, concrete ideas, familiar actions",
    "The dog ran across the grass. It saw a red ball and barked happily. The ball rolled into a puddle, and the dog splashed after it."),
  ("Simple sequencing, basic emotion",
    "Mia walked to the park with her brother. The swing moved high and low, and the wind brushed her face. It was her favourite part of the day."),
  ("Description, cause and effect",
    "The old tree stood at the edge of the playground. Its branches stretched wide, giving shade on hot days. When the bell rang, children gathered underneath it."),
  ("Figurative language (basic), expanded sentences",
    "Rain tapped gently on the window as Leo finished his homework. The sound reminded him of fingers drumming on a table. Outside, puddles grew bigger and shinier."),
  ("Stronger description, inner thought",
    "The hallway felt longer than usual as Ava walked toward the office. Her heart thumped like a drum in her chest. She didn't know what she had done wrong."),
  ("Mood, tension, varied sentence length",
    "The forest grew quiet as the sun dipped behind the hills. Birds vanished into the trees, and the air turned cool. Sam slowed his steps."),
  ("Metaphor, inference, stronger vocabulary",
    "The classroom buzzed with energy before the debate began. Ideas bounced from desk to desk like sparks. Ella clenched her notes, knowing her turn was coming."),
  ("Character motivation, symbolism",
    "The cracked trophy sat at the back of the shelf, forgotten. Once, it had meant everything to Marcus. Now, it reminded him of how much he had changed."),
  ("Abstract ideas, controlled imagery",
    "The town looked smaller from the hill, as if its problems could be folded away. Lila knew that wasn't true. Distance made things seem simple."),
  ("Theme, implication, layered meaning",
    "The announcement echoed through the hall, but no one spoke. Some students stared at the floor; others smiled too quickly. Change had arrived."),
  ("Symbolism, authorial intent, interpretation",
    "The river no longer flooded the village, yet people still feared it. Old stories clung to its banks like mist. Even progress could not erase memory."),
  ("Ambiguity, complex metaphor, tone",
    "The abandoned house leaned into the wind, its windows dark and watchful. Time had stripped it of warmth but not of presence."),
  ("Dense language, abstraction, layered symbolism",
    "The silence in the courtroom was not empty; it was burdened. Every pause carried the residue of unspoken truths. Justice was less a verdict than a negotiation with memory."),
];

pub fn reading_reference(year: u32) -> (&'static str, &'static str) {
  let idx = year.clamp(1, READING_REFERENCES.len() as u32) as usize - 1;
  READING_REFERENCES[idx]
}
